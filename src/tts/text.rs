//! Подготовка текста для TTS

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref HTML_TAG: Regex = Regex::new(r"<[^>]*>").expect("valid html tag regex");
    static ref ELLIPSIS: Regex = Regex::new(r"\.{3,}|…").expect("valid ellipsis regex");
}

/// Подготовка текста субтитра для TTS
///
/// Удаляет HTML-теги, раскрывает распространённые сущности, заменяет
/// многоточия паузой и нормализует пробелы.
pub fn prepare_text_for_tts(text: &str) -> String {
    let text = HTML_TAG.replace_all(text, "");

    let text = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&");

    let text = ELLIPSIS.replace_all(&text, ". ");

    text.split_whitespace().collect::<Vec<&str>>().join(" ")
}

/// Очистка ответа LLM: пробелы по краям и обрамляющие кавычки
pub fn clean_rewritten_text(reply: &str) -> String {
    let trimmed = reply.trim();
    let unquoted = ['"', '\'', '«', '“']
        .iter()
        .zip(['"', '\'', '»', '”'].iter())
        .find_map(|(open, close)| {
            trimmed
                .strip_prefix(*open)
                .and_then(|rest| rest.strip_suffix(*close))
        })
        .unwrap_or(trimmed);
    unquoted.split_whitespace().collect::<Vec<&str>>().join(" ")
}

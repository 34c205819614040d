//! Вспомогательные модули

pub mod ffmpeg;
pub mod temp;

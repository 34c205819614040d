//! Модуль для работы с временными файлами

use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Менеджер временных файлов
///
/// Директория удаляется вместе со всем содержимым при уничтожении объекта.
pub struct TempFileManager {
    temp_dir: TempDir,
    files: Vec<PathBuf>,
}

impl TempFileManager {
    pub fn new() -> std::io::Result<Self> {
        let temp_dir = tempfile::Builder::new().prefix("narration-sync").tempdir()?;
        Ok(Self {
            temp_dir,
            files: Vec::new(),
        })
    }

    /// Зарезервировать уникальный путь для временного файла
    pub fn reserve_path(&mut self, prefix: &str, extension: &str) -> PathBuf {
        let file_name = format!("{}_{}.{}", prefix, uuid::Uuid::new_v4(), extension);
        let file_path = self.temp_dir.path().join(file_name);
        self.files.push(file_path.clone());
        file_path
    }

    /// Записать данные во временный файл
    pub async fn write_temp_file(
        &mut self,
        prefix: &str,
        extension: &str,
        data: &[u8],
    ) -> std::io::Result<PathBuf> {
        let path = self.reserve_path(prefix, extension);
        tokio::fs::write(&path, data).await?;
        Ok(path)
    }

    pub fn temp_dir_path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }
}

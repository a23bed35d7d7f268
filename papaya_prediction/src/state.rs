use crate::{
    config::{LabelsConfig, Validatable},
    error::PredictionError,
};
use std::{
    fs::File,
    io::{self, BufRead},
    path::Path,
};

pub trait State: Send + Sync + 'static {
    fn new(labels_cfg: &LabelsConfig) -> Result<Self, PredictionError>
    where
        Self: Sized;
    fn get_labels(&self) -> &[String];
}

#[derive(Debug, Clone)]
pub struct ServiceState {
    class_labels: Vec<String>,
}

impl ServiceState {
    pub fn from_labels<I, L>(labels: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<String>,
    {
        Self {
            class_labels: labels.into_iter().map(Into::into).collect(),
        }
    }
}

impl State for ServiceState {
    fn new(labels_cfg: &LabelsConfig) -> Result<ServiceState, PredictionError> {
        match load_labels(&labels_cfg.get_path()) {
            Ok(labels) if labels.is_empty() => Err(PredictionError::Labels(format!(
                "no labels in {:?}",
                labels_cfg.get_path()
            ))),
            Ok(labels) => Ok(ServiceState {
                class_labels: labels,
            }),
            Err(e) => Err(PredictionError::Labels(e.to_string())),
        }
    }

    fn get_labels(&self) -> &[String] {
        &self.class_labels
    }
}

/// Reads one label per line, in class index order. Blank lines and `#` comments are skipped.
pub fn load_labels(filepath: &Path) -> io::Result<Vec<String>> {
    let file = File::open(filepath)?;
    let reader = io::BufReader::new(file);
    let mut labels: Vec<String> = Vec::new();

    for line_result in reader.lines() {
        let line = line_result?;
        let label = line.trim();

        if label.is_empty() || label.starts_with('#') {
            continue;
        }
        if label.contains(char::is_whitespace) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Invalid label: {}", label),
            ));
        }
        if labels.iter().any(|known| known == label) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Duplicate label: {}", label),
            ));
        }

        labels.push(label.to_string());
    }

    Ok(labels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn labels_config(content: &str) -> (tempfile::TempDir, LabelsConfig) {
        let dir = tempfile::tempdir().unwrap();
        let mut file = File::create(dir.path().join("labels.txt")).unwrap();
        file.write_all(content.as_bytes()).unwrap();

        let cfg = LabelsConfig {
            labels_file: "labels.txt".to_string(),
            labels_dir: dir.path().to_path_buf(),
        };
        (dir, cfg)
    }

    #[test]
    fn test_load_labels_in_order() {
        let (_dir, cfg) = labels_config("# papaya ripeness\nmatang\n\nmentah\n  setengah  \n");

        let state = ServiceState::new(&cfg).unwrap();

        assert_eq!(state.get_labels(), &["matang", "mentah", "setengah"]);
    }

    #[test]
    fn test_duplicate_label_is_rejected() {
        let (_dir, cfg) = labels_config("matang\nmatang\n");

        let err = ServiceState::new(&cfg).unwrap_err();
        assert!(err.to_string().contains("Duplicate label"));
    }

    #[test]
    fn test_empty_labels_file_is_rejected() {
        let (_dir, cfg) = labels_config("# nothing here\n");

        assert!(matches!(
            ServiceState::new(&cfg),
            Err(PredictionError::Labels(_))
        ));
    }

    #[test]
    fn test_missing_labels_file_is_rejected() {
        let cfg = LabelsConfig {
            labels_file: "labels.txt".to_string(),
            labels_dir: "./no-such-dir".into(),
        };

        assert!(ServiceState::new(&cfg).is_err());
    }
}

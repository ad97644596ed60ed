use super::*;
use tempfile::TempDir;

#[test]
fn defaults_when_no_config_file() {
    let dir = TempDir::new().expect("temp dir");
    let config = Config::load(dir.path()).expect("load defaults");

    assert_eq!(config.ollama, OllamaConfig::default());
    assert_eq!(config.indexing.default_limit, 30);
    assert_eq!(config.indexing.max_limit, 200);
    assert_eq!(config.indexing.max_chunks_per_patient, 220);
    assert_eq!(config.chunking.chunk_size, 520);
    assert_eq!(config.chunking.chunk_overlap, 100);
    assert_eq!(config.base_dir, dir.path());
}

#[test]
fn save_and_reload_roundtrip() {
    let dir = TempDir::new().expect("temp dir");
    let mut config = Config::load(dir.path()).expect("load defaults");
    config.indexing.default_limit = 10;
    config.ollama.port = 12345;
    config.save().expect("save config");

    let reloaded = Config::load(dir.path()).expect("reload config");
    assert_eq!(reloaded.indexing.default_limit, 10);
    assert_eq!(reloaded.ollama.port, 12345);
}

#[test]
fn overlap_must_be_smaller_than_chunk_size() {
    let dir = TempDir::new().expect("temp dir");
    let mut config = Config::load(dir.path()).expect("load defaults");
    config.chunking.chunk_overlap = config.chunking.chunk_size;

    assert!(matches!(
        config.validate(),
        Err(ConfigError::OverlapTooLarge(_, _))
    ));
}

#[test]
fn default_limit_cannot_exceed_max_limit() {
    let dir = TempDir::new().expect("temp dir");
    let mut config = Config::load(dir.path()).expect("load defaults");
    config.indexing.default_limit = 500;

    assert!(matches!(
        config.validate(),
        Err(ConfigError::DefaultLimitTooLarge(500, 200))
    ));
}

#[test]
fn ollama_validation_rejects_bad_values() {
    let mut ollama = OllamaConfig::default();
    ollama.protocol = "ftp".to_string();
    assert!(matches!(
        ollama.validate(),
        Err(ConfigError::InvalidProtocol(_))
    ));

    let mut ollama = OllamaConfig::default();
    ollama.model = "  ".to_string();
    assert!(matches!(ollama.validate(), Err(ConfigError::InvalidModel(_))));

    let mut ollama = OllamaConfig::default();
    ollama.batch_size = 0;
    assert!(matches!(
        ollama.validate(),
        Err(ConfigError::InvalidBatchSize(0))
    ));
}

#[test]
fn ollama_url_is_built_from_parts() {
    let ollama = OllamaConfig::default();
    let url = ollama.ollama_url().expect("valid url");
    assert_eq!(url.as_str(), "http://localhost:11434/");
}

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::chunker::ChunkingConfig;
use crate::error::{Error, Result};

pub struct Config {
    figment: Figment,
    base_dir: PathBuf,
}

impl Config {
    /// `config.toml` + `config.<RUST_ENV>.toml` + `APP_*` env vars over built-in defaults.
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let base_dir = env::current_dir()?;
        Ok(Self { figment, base_dir })
    }

    /// A single explicit file instead of the environment layering; env vars still apply.
    /// Relative paths inside it resolve against the file's directory.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::InvalidConfig(format!("config file {} not found", path.display())));
        }
        let figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("APP_").split("__"));
        let base_dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => env::current_dir()?,
        };
        Ok(Self { figment, base_dir })
    }

    pub fn from_figment(figment: Figment, base_dir: impl Into<PathBuf>) -> Self {
        Self { figment, base_dir: base_dir.into() }
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("Failed to get '{}': {}", key, e)))
    }

    /// Typed settings with paths resolved against the config base directory.
    pub fn settings(&self) -> Result<Settings> {
        let mut settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.resolve_paths(&self.base_dir);
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub corpus: CorpusSettings,
    pub index: IndexSettings,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalSettings,
    pub gateway: GatewaySettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusSettings {
    /// A file or a directory of raw text files.
    pub path: PathBuf,
    pub extensions: Vec<String>,
}

impl Default for CorpusSettings {
    fn default() -> Self {
        Self { path: PathBuf::from("docs"), extensions: vec!["md".to_string(), "txt".to_string()] }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    pub snapshot_path: PathBuf,
    pub embed_batch_size: usize,
    pub progress: bool,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self { snapshot_path: PathBuf::from("data/vectorstore.json"), embed_batch_size: 32, progress: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub top_k: usize,
    /// Hits scoring below this are dropped after ranking.
    pub similarity_threshold: Option<f32>,
    /// Prompt template file; the built-in template is used when unset.
    pub template_path: Option<PathBuf>,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self { top_k: 2, similarity_threshold: None, template_path: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedderKind {
    /// In-process feature hashing, no model files.
    Hash,
    Ollama,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenizerKind {
    Word,
    /// A HuggingFace `tokenizer.json`, see `GatewaySettings::tokenizer_path`.
    Huggingface,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeneratorKind {
    /// Returns the assembled prompt; useful for dry runs.
    Echo,
    Ollama,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewaySettings {
    pub embedder: EmbedderKind,
    pub tokenizer: TokenizerKind,
    pub tokenizer_path: Option<PathBuf>,
    pub generator: GeneratorKind,
    pub base_url: String,
    pub embedding_model: String,
    pub completion_model: String,
    pub hash_dimension: usize,
    pub timeout_ms: u64,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            embedder: EmbedderKind::Hash,
            tokenizer: TokenizerKind::Word,
            tokenizer_path: None,
            generator: GeneratorKind::Echo,
            base_url: "http://localhost:11434".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            completion_model: "llama3.2".to_string(),
            hash_dimension: 384,
            timeout_ms: 30_000,
        }
    }
}

impl GatewaySettings {
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default `EnvFilter` directive when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self { level: "info".to_string() }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("chunking.chunk_size", self.chunking.chunk_size),
            ("chunking.max_chunks", self.chunking.max_chunks),
            ("index.embed_batch_size", self.index.embed_batch_size),
            ("retrieval.top_k", self.retrieval.top_k),
        ];
        for (key, value) in positive {
            if value == 0 {
                return Err(Error::InvalidConfig(format!("{key} must be greater than 0")));
            }
        }
        if self.gateway.timeout_ms == 0 {
            return Err(Error::InvalidConfig("gateway.timeout_ms must be greater than 0".into()));
        }
        if self.gateway.embedder == EmbedderKind::Hash && self.gateway.hash_dimension == 0 {
            return Err(Error::InvalidConfig("gateway.hash_dimension must be greater than 0".into()));
        }
        if self.gateway.tokenizer == TokenizerKind::Huggingface && self.gateway.tokenizer_path.is_none() {
            return Err(Error::InvalidConfig("gateway.tokenizer_path is required for the huggingface tokenizer".into()));
        }
        if let Some(t) = self.retrieval.similarity_threshold {
            if !(-1.0..=1.0).contains(&t) {
                return Err(Error::InvalidConfig(format!("retrieval.similarity_threshold {t} is outside [-1, 1]")));
            }
        }
        Ok(())
    }

    fn resolve_paths(&mut self, base: &Path) {
        self.corpus.path = resolve_with_base(base, self.corpus.path.to_string_lossy());
        self.index.snapshot_path = resolve_with_base(base, self.index.snapshot_path.to_string_lossy());
        if let Some(p) = self.retrieval.template_path.take() {
            self.retrieval.template_path = Some(resolve_with_base(base, p.to_string_lossy()));
        }
        if let Some(p) = self.gateway.tokenizer_path.take() {
            self.gateway.tokenizer_path = Some(resolve_with_base(base, p.to_string_lossy()));
        }
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::OverflowPolicy;
    use figment::Jail;

    #[test]
    fn defaults_are_valid() {
        let settings = Settings::default();
        settings.validate().expect("defaults validate");
        assert_eq!(settings.retrieval.top_k, 2);
        assert_eq!(settings.chunking.chunk_size, 256);
        assert_eq!(settings.chunking.max_chunks, 256);
        assert_eq!(settings.gateway.embedder, EmbedderKind::Hash);
    }

    #[test]
    fn files_and_env_layer_over_defaults() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file(
                "config.toml",
                r#"
                [retrieval]
                top_k = 4

                [chunking]
                overflow = "reject"

                [index]
                snapshot_path = "store/index.json"
                "#,
            )?;
            jail.create_file("config.dev.toml", "[retrieval]\ntop_k = 5\n")?;
            jail.set_env("APP_CHUNKING__CHUNK_SIZE", "128");
            jail.set_env("APP_GATEWAY__EMBEDDER", "ollama");

            let config = Config::load().map_err(|e| e.to_string())?;
            let settings = config.settings().map_err(|e| e.to_string())?;
            assert_eq!(settings.retrieval.top_k, 5);
            assert_eq!(settings.chunking.chunk_size, 128);
            assert_eq!(settings.chunking.max_chunks, 256);
            assert_eq!(settings.chunking.overflow, OverflowPolicy::Reject);
            assert_eq!(settings.gateway.embedder, EmbedderKind::Ollama);
            assert!(settings.index.snapshot_path.is_absolute());
            assert!(settings.index.snapshot_path.ends_with("store/index.json"));
            assert_eq!(config.get::<usize>("retrieval.top_k").map_err(|e| e.to_string())?, 5);
            Ok(())
        });
    }

    #[test]
    fn explicit_file_resolves_relative_to_itself() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            std::fs::create_dir_all("conf").map_err(|e| e.to_string())?;
            jail.create_file("conf/scandoc.toml", "[corpus]\npath = \"../docs/k8s.md\"\n")?;
            let config = Config::from_file(Path::new("conf/scandoc.toml")).map_err(|e| e.to_string())?;
            let settings = config.settings().map_err(|e| e.to_string())?;
            assert!(settings.corpus.path.starts_with("conf"));
            assert!(settings.corpus.path.ends_with("docs/k8s.md"));
            Ok(())
        });
    }

    #[test]
    fn zero_values_are_rejected() {
        let mut settings = Settings::default();
        settings.retrieval.top_k = 0;
        assert!(matches!(settings.validate(), Err(Error::InvalidConfig(_))));

        let mut settings = Settings::default();
        settings.gateway.tokenizer = TokenizerKind::Huggingface;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.retrieval.similarity_threshold = Some(1.5);
        assert!(settings.validate().is_err());
    }

    #[test]
    fn unknown_enum_value_is_invalid_config() {
        let figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Serialized::default("gateway.embedder", "word2vec"));
        let err = Config::from_figment(figment, ".").settings().unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn expands_home_and_env_vars() {
        Jail::expect_with(|jail| {
            jail.set_env("SCANDOC_TEST_DIR", "/srv/scandoc");
            let p = resolve_with_base(Path::new("/base"), "$SCANDOC_TEST_DIR/index.json");
            assert_eq!(p, PathBuf::from("/srv/scandoc/index.json"));
            assert_eq!(resolve_with_base(Path::new("/base"), "rel.json"), PathBuf::from("/base/rel.json"));
            Ok(())
        });
    }
}

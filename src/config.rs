use crate::kind::{ExtractionKind, MetadataDialect};
use clap::{Parser, Subcommand};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Default port of the persistent extraction server.
pub const DEFAULT_SERVER_PORT: u16 = 9293;

/// Default location of the engine artifact.
pub const DEFAULT_JAR_PATH: &str = "jar/tika-app-1.6.jar";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<String>,

    /// Engine artifact (tika-app jar)
    #[arg(long, env = "TIKA_JAR")]
    pub jar: Option<String>,

    /// Java installation directory
    #[arg(long)]
    pub java_home: Option<String>,

    /// Use the line-oriented metadata dialect of older engines
    #[arg(long)]
    pub legacy_metadata: bool,

    /// Route requests through an already running server on this port; the
    /// server must have been started for the same kind
    #[arg(long)]
    pub server_port: Option<u16>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Extract plain text
    Text { input: String },
    /// Extract XHTML
    Html { input: String },
    /// Extract metadata as JSON
    Metadata { input: String },
    /// Detect the content type
    Mimetype { input: String },
    /// Run a persistent extraction server until interrupted
    Serve {
        #[arg(long, value_enum, default_value_t = ExtractionKind::Text)]
        kind: ExtractionKind,
        #[arg(long)]
        port: Option<u16>,
    },
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct TikaConfig {
    pub engine: EngineConfig,
    pub server: ServerConfig,
    pub fetch: FetchConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EngineConfig {
    /// Java installation directory; `None` resolves `java` from `PATH`.
    #[serde(default)]
    pub java_home: Option<String>,
    pub jar_path: String,
    pub dialect: MetadataDialect,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub ready_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FetchConfig {
    pub timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            java_home: java_home_from_env(),
            jar_path: DEFAULT_JAR_PATH.to_string(),
            dialect: MetadataDialect::Json,
            timeout_secs: 120,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_SERVER_PORT,
            ready_timeout_secs: 30,
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { timeout_secs: 60 }
    }
}

impl EngineConfig {
    /// Path of the Java executable used to launch the engine.
    pub fn java_executable(&self) -> PathBuf {
        java_executable(self.java_home.as_deref())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ServerConfig {
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_secs)
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// `<java_home>/bin/java` when a Java home is known, bare `java` otherwise.
pub fn java_executable(java_home: Option<&str>) -> PathBuf {
    match java_home {
        Some(home) => PathBuf::from(format!("{home}/bin/java")),
        None => PathBuf::from("java"),
    }
}

fn java_home_from_env() -> Option<String> {
    env::var("JAVA_HOME").ok().filter(|s| !s.trim().is_empty())
}

impl TikaConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from_args(std::env::args())
    }

    pub fn load_from_args<I, T>(args: I) -> Result<Self, config::ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli =
            Cli::try_parse_from(args).map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Self::from_cli(&cli)
    }

    /// Layer defaults, `JAVA_HOME`, config file, `TIKA_` environment and CLI flags.
    ///
    /// Priority: CLI flag > `TIKA_*` env var > config file > `JAVA_HOME` > defaults.
    pub fn from_cli(cli: &Cli) -> Result<Self, config::ConfigError> {
        let mut builder = Config::builder();

        // 1. Defaults
        builder = builder
            .set_default("engine.jar_path", DEFAULT_JAR_PATH)?
            .set_default("engine.dialect", "json")?
            .set_default("engine.timeout_secs", 120)?
            .set_default("server.port", i64::from(DEFAULT_SERVER_PORT))?
            .set_default("server.ready_timeout_secs", 30)?
            .set_default("fetch.timeout_secs", 60)?;

        if let Some(home) = java_home_from_env() {
            builder = builder.set_default("engine.java_home", home)?;
        }

        // 2. Config file
        if let Some(path) = &cli.config {
            builder = builder.add_source(File::with_name(path));
        }

        // 3. Environment variables, e.g. TIKA_SERVER__PORT=9000
        builder = builder.add_source(
            Environment::with_prefix("TIKA")
                .separator("__")
                .try_parsing(true),
        );

        // 4. CLI overrides
        if let Some(jar) = &cli.jar {
            builder = builder.set_override("engine.jar_path", jar.as_str())?;
        }
        if let Some(home) = &cli.java_home {
            builder = builder.set_override("engine.java_home", home.as_str())?;
        }
        if cli.legacy_metadata {
            builder = builder.set_override("engine.dialect", "legacy")?;
        }
        if let Some(port) = cli.server_port {
            builder = builder.set_override("server.port", i64::from(port))?;
        }

        let cfg = builder.build()?;
        cfg.try_deserialize()
    }
}

use std::path::PathBuf;

/// URL prefix uploaded backgrounds are served under.
pub const UPLOADS_PREFIX: &str = "/uploads";

#[derive(Clone, Debug)]
pub struct Config {
    /// Without a database URL the service keeps records in memory.
    pub database_url: Option<String>,
    pub upload_folder: PathBuf,
    pub font_dir: Option<PathBuf>,
    pub admin_token: Option<String>,
    pub host: String,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        dotenvy::dotenv().ok();

        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        let base_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let upload_folder = base_dir.join(
            std::env::var("UPLOAD_FOLDER").unwrap_or_else(|_| "uploads".to_string()),
        );
        let font_dir = std::env::var("FONT_DIR").ok().map(PathBuf::from);

        let admin_token = std::env::var("ADMIN_TOKEN")
            .ok()
            .filter(|token| !token.trim().is_empty());

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "5001".to_string())
            .parse()
            .map_err(|_| "PORT must be a number between 0 and 65535")?;

        Ok(Self {
            database_url,
            upload_folder,
            font_dir,
            admin_token,
            host,
            port,
        })
    }

    /// Settings for tests and local tooling: in-memory records, files under
    /// `upload_folder`.
    pub fn local(upload_folder: impl Into<PathBuf>, admin_token: Option<&str>) -> Self {
        Self {
            database_url: None,
            upload_folder: upload_folder.into(),
            font_dir: None,
            admin_token: admin_token.map(str::to_string),
            host: "127.0.0.1".to_string(),
            port: 5001,
        }
    }
}

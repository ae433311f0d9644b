use std::path::Path;
use std::sync::OnceLock;
use tera::Tera;

static TERA: OnceLock<Tera> = OnceLock::new();

/// Page templates, loaded once from `templates/`.
///
/// A broken template is logged and leaves the set empty; pages then render
/// a plain error instead of taking the process down.
pub fn get_tera() -> &'static Tera {
    TERA.get_or_init(|| {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("templates");
        let fallback = Path::new("templates");
        let dir = if dir.exists() { dir } else { fallback.to_path_buf() };

        match load(&dir) {
            Ok(tera) => tera,
            Err(e) => {
                tracing::error!("Failed to load templates from {}: {}", dir.display(), e);
                Tera::default()
            }
        }
    })
}

fn load(dir: &Path) -> Result<Tera, tera::Error> {
    let mut tera = Tera::default();
    if !dir.exists() {
        return Ok(tera);
    }
    let entries = std::fs::read_dir(dir).map_err(|e| tera::Error::msg(e.to_string()))?;
    let files: Vec<_> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "html"))
        .filter_map(|p| {
            let name = p.file_name()?.to_str()?.to_string();
            Some((p, Some(name)))
        })
        .collect();
    tera.add_template_files(files)?;
    Ok(tera)
}

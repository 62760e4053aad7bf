use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;
use tracing::info;

pub const DEFAULT_TEMPLATE_FILENAME: &str = "sitemaps.xml";

/// Starter root document written by `sitemapwalk init`.
pub const SITEMAPS_TEMPLATE: &str = include_str!("../templates/sitemaps.tmpl.xml");

/// Write the starter template to `path`. Without `force` an existing file is
/// left alone and `AlreadyExists` is returned.
pub fn write_template(path: &Path, force: bool) -> io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true);
    if force {
        options.create(true).truncate(true);
    } else {
        options.create_new(true);
    }

    let mut file = options.open(path)?;
    file.write_all(SITEMAPS_TEMPLATE.as_bytes())?;
    info!("Wrote sitemap template to {}", path.display());
    Ok(())
}

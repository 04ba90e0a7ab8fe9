use std::fs;
use std::path::Path;

use crate::core::{Result, ServerError};
use crate::engine::Route;

/// Routes exported by one module file.
#[derive(Debug)]
pub struct RouteModule {
    /// File name, used in the "Added … to the API routes." log line.
    pub name: String,
    pub routes: Vec<Route>,
}

/// Turns a directory into route modules, in load order.
pub trait RouteSource: Send + Sync {
    fn list_modules(&self, dir: &Path) -> Result<Vec<RouteModule>>;
}

/// Loads the route array of a single module file.
pub trait ModuleLoader: Send + Sync {
    /// File name suffix this loader accepts (e.g. `".json"`).
    fn suffix(&self) -> &str;

    fn load(&self, path: &Path) -> Result<Vec<Route>>;
}

/// Non-recursive directory scan. Hidden files and names without the loader's
/// suffix are skipped; files are loaded in file-name order.
#[derive(Debug, Clone, Default)]
pub struct DirectoryRouteSource<L> {
    loader: L,
}

impl<L: ModuleLoader> DirectoryRouteSource<L> {
    pub fn new(loader: L) -> Self {
        Self { loader }
    }

    fn module_files(&self, dir: &Path) -> Result<Vec<String>> {
        let listing_error = |source| ServerError::RouteDirectory {
            path: dir.to_path_buf(),
            source,
        };

        let mut names = Vec::new();
        for entry in fs::read_dir(dir).map_err(listing_error)? {
            let entry = entry.map_err(listing_error)?;
            if !entry.file_type().map_err(listing_error)?.is_file() {
                continue;
            }
            let Ok(name) = entry.file_name().into_string() else {
                tracing::warn!(file = ?entry.file_name(), "Skipping non UTF-8 file name");
                continue;
            };
            if name.starts_with('.') || !name.ends_with(self.loader.suffix()) {
                continue;
            }
            names.push(name);
        }
        names.sort();
        Ok(names)
    }
}

impl<L: ModuleLoader> RouteSource for DirectoryRouteSource<L> {
    fn list_modules(&self, dir: &Path) -> Result<Vec<RouteModule>> {
        self.module_files(dir)?
            .into_iter()
            .map(|name| {
                let routes = self.loader.load(&dir.join(&name))?;
                Ok(RouteModule { name, routes })
            })
            .collect()
    }
}

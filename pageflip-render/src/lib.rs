use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use image::imageops::FilterType;
use pageflip_core::{Page, PageId, PageProvider, PageStore, RenderImage};
use parking_lot::Mutex;
use rayon::prelude::*;
use tracing::{debug, instrument, warn};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

pub trait ImageSource: Send + Sync {
    fn load(&self, page: &Page) -> Result<RenderImage>;
}

/// Resolves locators against a root directory and decodes them with `image`.
pub struct FsImageSource {
    root: PathBuf,
    max_edge: u32,
}

impl FsImageSource {
    pub fn new(root: PathBuf, max_edge: u32) -> Self {
        Self {
            root,
            max_edge: max_edge.max(1),
        }
    }

    /// Locators are URI-like: a leading `/` means "relative to the root".
    pub fn resolve(&self, locator: &str) -> Result<PathBuf> {
        let relative = Path::new(locator.trim_start_matches('/'));
        if relative
            .components()
            .any(|component| matches!(component, Component::ParentDir | Component::Prefix(_)))
        {
            return Err(anyhow!("locator {:?} escapes the image root", locator));
        }
        Ok(self.root.join(relative))
    }
}

impl ImageSource for FsImageSource {
    #[instrument(skip(self, page), fields(id = page.id, locator = %page.image_locator))]
    fn load(&self, page: &Page) -> Result<RenderImage> {
        let path = self.resolve(&page.image_locator)?;
        let decoded =
            image::open(&path).with_context(|| format!("failed to decode image {:?}", path))?;
        let decoded = if decoded.width().max(decoded.height()) > self.max_edge {
            decoded.resize(self.max_edge, self.max_edge, FilterType::Triangle)
        } else {
            decoded
        };
        let rgba = decoded.to_rgba8();
        let (width, height) = rgba.dimensions();
        debug!(width, height, "page image decoded");
        Ok(RenderImage {
            width,
            height,
            pixels: rgba.into_raw(),
        })
    }
}

/// Decodes a batch of pages in parallel. Results keep the input order.
pub fn load_batch<S: ImageSource + ?Sized>(
    source: &S,
    pages: &[Page],
) -> Vec<(PageId, Result<RenderImage>)> {
    pages
        .par_iter()
        .map(|page| (page.id, source.load(page)))
        .collect()
}

/// Decoded page images, trimmed to the pages closest to the reading position.
pub struct ImageCache {
    capacity: usize,
    entries: Mutex<HashMap<PageId, CacheEntry>>,
}

struct CacheEntry {
    index: usize,
    image: RenderImage,
}

impl ImageCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(2),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, id: PageId) -> Option<RenderImage> {
        self.entries.lock().get(&id).map(|entry| entry.image.clone())
    }

    pub fn contains(&self, id: PageId) -> bool {
        self.entries.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn insert(&self, id: PageId, index: usize, image: RenderImage, reference_index: usize) {
        let mut entries = self.entries.lock();
        entries.insert(id, CacheEntry { index, image });

        if entries.len() > self.capacity {
            let mut keys: Vec<_> = entries
                .iter()
                .map(|(id, entry)| (*id, entry.index.abs_diff(reference_index)))
                .collect();
            keys.sort_by_key(|(_, distance)| *distance);
            for (stale, distance) in keys.into_iter().skip(self.capacity) {
                debug!(id = stale, distance, "evicting cached page image");
                entries.remove(&stale);
            }
        }
    }
}

/// Every image in a directory, ordered by file name.
pub struct DirectoryPages {
    dir: PathBuf,
}

impl DirectoryPages {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

#[async_trait]
impl PageProvider for DirectoryPages {
    #[instrument(skip(self), fields(dir = %self.dir.display()))]
    async fn pages(&self) -> Result<PageStore> {
        let entries = fs::read_dir(&self.dir)
            .with_context(|| format!("failed to read image directory {:?}", self.dir))?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() || !is_image(&path) {
                continue;
            }
            match path.file_name().and_then(|name| name.to_str()) {
                Some(name) => names.push(name.to_owned()),
                None => warn!(path = %path.display(), "skipping non UTF-8 file name"),
            }
        }
        names.sort();

        let pages = names
            .into_iter()
            .enumerate()
            .map(|(index, name)| Page::new(index as PageId, format!("/{}", name)))
            .collect::<Vec<_>>();
        debug!(count = pages.len(), "directory scanned");
        Ok(PageStore::new(pages))
    }
}

//! Downloaded scenes and the collections they are reported in.
use crate::error::{Error, Result};
use crate::fetch::check_create_folder;
use bzip2::read::MultiBzDecoder;
use flate2::read::MultiGzDecoder;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::ops::Index;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{info, warn};

const ARCHIVE_EXTENSIONS: [&str; 3] = ["gz", "bz", "bz2"];
const IMAGE_PATTERNS: [&str; 3] = ["*.tif", "*.TIF", "*.jp2"];

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
pub struct Scene {
    pub name: String,
    pub files: Vec<PathBuf>,
    pub band_files: Vec<PathBuf>,
    pub archive_file: Option<PathBuf>,
    pub archived: bool,
}

impl Scene {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_files<I, P>(name: &str, files: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut scene = Self::new(name);
        for f in files {
            scene.add(f);
        }
        scene
    }

    /// Appends a file. A compressed archive replaces any archive already
    /// registered on the scene.
    pub fn add<P: Into<PathBuf>>(&mut self, file: P) {
        let file = file.into();
        if is_archive(&file) {
            self.archived = true;
            self.archive_file = Some(file.clone());
        } else {
            self.band_files.push(file.clone());
        }
        self.files.push(file);
    }

    /// Extracts the archive into `path` (by default a folder named after the
    /// scene next to the archive) and registers the images found there.
    pub fn unzip(&mut self, path: Option<&Path>) -> Result<Vec<PathBuf>> {
        let archive = match (&self.archive_file, self.archived) {
            (Some(archive), true) => archive.clone(),
            _ => return Err(Error::NotArchived(self.name.clone())),
        };

        let dest = match path {
            Some(p) => p.to_path_buf(),
            None => archive
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join(&self.name),
        };
        check_create_folder(&dest)?;

        if let Err(e) = unpack(&archive, &dest) {
            warn!(archive = %archive.display(), error = %e, "Falling back to the tar command");
            unpack_with_tar_command(&archive, &dest)?;
        }

        let images = find_images(&dest)?;
        for image in &images {
            self.add(image.clone());
        }
        self.archived = false;
        info!(scene = %self.name, images = images.len(), "Extracted {}", archive.display());

        Ok(images)
    }
}

impl std::fmt::Display for Scene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

fn is_archive(file: &Path) -> bool {
    file.extension()
        .and_then(|e| e.to_str())
        .map(|e| ARCHIVE_EXTENSIONS.contains(&e))
        .unwrap_or(false)
}

/// Unpacks a tar archive, detecting bzip2 and gzip compression from the magic
/// bytes.
fn unpack(archive: &Path, dest: &Path) -> io::Result<()> {
    let mut file = File::open(archive)?;
    let mut magic = [0_u8; 3];
    let n = file.read(&mut magic)?;
    file.seek(SeekFrom::Start(0))?;

    let reader: Box<dyn Read> = match &magic[..n] {
        [b'B', b'Z', b'h'] => Box::new(MultiBzDecoder::new(BufReader::new(file))),
        [0x1f, 0x8b, ..] => Box::new(MultiGzDecoder::new(BufReader::new(file))),
        _ => Box::new(BufReader::new(file)),
    };

    tar::Archive::new(reader).unpack(dest)
}

fn unpack_with_tar_command(archive: &Path, dest: &Path) -> Result<()> {
    let output = Command::new("tar")
        .arg("-xf")
        .arg(archive)
        .arg("-C")
        .arg(dest)
        .output()
        .map_err(|e| Error::Extraction {
            path: archive.to_path_buf(),
            reason: format!("Failed to run tar: {}", e),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Extraction {
            path: archive.to_path_buf(),
            reason: format!("tar extraction failed: {}", stderr.trim()),
        });
    }
    Ok(())
}

fn find_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let escaped = glob::Pattern::escape(&dir.to_string_lossy());
    let mut images = vec![];
    for pattern in IMAGE_PATTERNS {
        let pattern = format!("{}/{}", escaped, pattern);
        let paths = glob::glob(&pattern).map_err(|e| Error::Extraction {
            path: dir.to_path_buf(),
            reason: e.to_string(),
        })?;
        images.extend(paths.filter_map(|p| p.ok()));
    }
    Ok(images)
}

/// Scenes in insertion order, addressable by position or by name.
///
/// Adding a scene whose name is already present replaces the earlier entry in
/// place, so both views always hold the same scenes.
#[derive(Serialize, Debug, Default, Clone)]
pub struct SceneCollection {
    scenes: Vec<Scene>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl SceneCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, scene: Scene) {
        match self.index.get(&scene.name) {
            Some(&i) => self.scenes[i] = scene,
            None => {
                self.index.insert(scene.name.clone(), self.scenes.len());
                self.scenes.push(scene);
            }
        }
    }

    pub fn add_with_files<I, P>(&mut self, name: &str, files: I)
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.add(Scene::with_files(name, files));
    }

    pub fn merge(&mut self, other: SceneCollection) {
        for scene in other.scenes {
            self.add(scene);
        }
    }

    pub fn get(&self, name: &str) -> Option<&Scene> {
        self.index.get(name).map(|&i| &self.scenes[i])
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Scene> {
        self.index.get(name).map(|&i| &mut self.scenes[i])
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Scene> {
        self.scenes.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.scenes.iter().map(|s| s.name.as_str()).collect()
    }

    /// Extracts every scene that still holds an archive. A scene that fails to
    /// extract keeps its archive and is returned with the error; the others
    /// are still extracted.
    pub fn unzip_all(&mut self) -> Vec<(String, Error)> {
        let mut failures = vec![];
        for scene in self.scenes.iter_mut().filter(|s| s.archived) {
            if let Err(e) = scene.unzip(None) {
                warn!(scene = %scene.name, error = %e, "Extraction failed");
                failures.push((scene.name.clone(), e));
            }
        }
        failures
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let report: Report = serde_json::from_str(&content)?;
        let mut collection = Self::new();
        for scene in report.scenes {
            collection.add(scene);
        }
        Ok(collection)
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}

#[derive(Deserialize)]
struct Report {
    scenes: Vec<Scene>,
}

impl Index<usize> for SceneCollection {
    type Output = Scene;

    fn index(&self, i: usize) -> &Scene {
        &self.scenes[i]
    }
}

impl<'a> IntoIterator for &'a SceneCollection {
    type Item = &'a Scene;
    type IntoIter = std::slice::Iter<'a, Scene>;

    fn into_iter(self) -> Self::IntoIter {
        self.scenes.iter()
    }
}

impl std::fmt::Display for SceneCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[Scenes]: Includes {} scenes", self.len())
    }
}

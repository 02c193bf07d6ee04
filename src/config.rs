use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use serde::Deserialize;

#[derive(Parser, Debug)]
#[command(name = "starfolio", about = "Portfolio starfield, globe and technology balls")]
pub struct Args {
    /// TOML file listing the globe model and the technology icons.
    #[arg(long)]
    pub content: Option<PathBuf>,

    #[arg(long, default_value_t = 1280)]
    pub width: u32,

    #[arg(long, default_value_t = 720)]
    pub height: u32,

    #[arg(long, default_value = "starfolio")]
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Technology {
    pub name: String,
    /// Texture location, a plain path or a `file://` URL.
    pub icon: String,
}

/// What the page shows besides the starfield.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Content {
    pub earth_model: Option<PathBuf>,
    pub technologies: Vec<Technology>,
}

impl Content {
    /// Reads a content file. Relative asset paths are taken relative to the
    /// file itself.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read content file: {:?}", path))?;
        let content = Self::parse(&text)
            .with_context(|| format!("Failed to parse content file: {:?}", path))?;

        let base = path.parent().unwrap_or_else(|| Path::new(""));
        let content = content.relative_to(base);
        info!(
            "Loaded {} technologies from {:?}, earth model {:?}",
            content.technologies.len(),
            path,
            content.earth_model
        );
        Ok(content)
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    fn relative_to(self, base: &Path) -> Self {
        Self {
            earth_model: self.earth_model.map(|model| base.join(model)),
            technologies: self
                .technologies
                .into_iter()
                .map(|technology| Technology {
                    icon: if technology.icon.starts_with("file://")
                        || Path::new(&technology.icon).is_absolute()
                    {
                        technology.icon
                    } else {
                        base.join(&technology.icon).to_string_lossy().into_owned()
                    },
                    ..technology
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_technologies_and_model() {
        let content = Content::parse(
            r#"
            earth_model = "planet/scene.gltf"

            [[technologies]]
            name = "Rust"
            icon = "tech/rust.png"

            [[technologies]]
            name = "wgpu"
            icon = "file:///icons/wgpu.png"
            "#,
        )
        .unwrap();

        assert_eq!(content.earth_model, Some(PathBuf::from("planet/scene.gltf")));
        assert_eq!(content.technologies.len(), 2);
        assert_eq!(content.technologies[0].name, "Rust");
    }

    #[test]
    fn empty_file_means_starfield_only() {
        assert_eq!(Content::parse("").unwrap(), Content::default());
    }

    #[test]
    fn rejects_technologies_without_icon() {
        assert!(Content::parse("[[technologies]]\nname = \"Rust\"\n").is_err());
    }

    #[test]
    fn relative_paths_follow_the_content_file() {
        let content = Content {
            earth_model: Some(PathBuf::from("planet/scene.gltf")),
            technologies: vec![
                Technology {
                    name: "Rust".into(),
                    icon: "tech/rust.png".into(),
                },
                Technology {
                    name: "wgpu".into(),
                    icon: "file:///icons/wgpu.png".into(),
                },
            ],
        }
        .relative_to(Path::new("site"));

        assert_eq!(content.earth_model, Some(PathBuf::from("site/planet/scene.gltf")));
        assert_eq!(
            PathBuf::from(&content.technologies[0].icon),
            PathBuf::from("site/tech/rust.png")
        );
        assert_eq!(content.technologies[1].icon, "file:///icons/wgpu.png");
    }

    #[test]
    fn load_reads_from_disk() {
        let dir = std::env::temp_dir().join(format!("starfolio-content-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("content.toml");
        fs::write(&path, "[[technologies]]\nname = \"Rust\"\nicon = \"rust.png\"\n").unwrap();

        let content = Content::load(&path).unwrap();
        assert_eq!(PathBuf::from(&content.technologies[0].icon), dir.join("rust.png"));
        assert!(Content::load(&dir.join("missing.toml")).is_err());

        fs::remove_dir_all(&dir).unwrap();
    }
}

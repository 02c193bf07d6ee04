use std::{
    future::Future,
    path::{Path, PathBuf},
    pin::Pin,
};

use glam::{Mat4, Vec3};
use log::{debug, info, warn};
use thiserror::Error;
use tokio::{
    runtime::Handle,
    sync::oneshot::{self, error::TryRecvError},
    task::JoinHandle,
};

use crate::{
    frame::Invalidator,
    geometry::{MeshData, MeshVertex},
};

/// External resource drawn by a viewport, identified opaquely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource {
    /// Image path or `file://` URL.
    Texture(String),
    /// Path to a glTF document.
    Model(PathBuf),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl TextureData {
    pub fn solid(color: [u8; 4]) -> Self {
        Self {
            width: 1,
            height: 1,
            rgba: color.to_vec(),
        }
    }
}

/// An imported model flattened into one mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelData {
    pub mesh: MeshData,
    /// Base color texture of the first textured material, sampled with the
    /// vertices' `uv`.
    pub texture: Option<TextureData>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Asset {
    Texture(TextureData),
    Model(ModelData),
}

impl Asset {
    pub fn kind(&self) -> &'static str {
        match self {
            Asset::Texture(_) => "texture",
            Asset::Model(_) => "model",
        }
    }
}

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("failed to read {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode texture {}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("failed to import model {}", .path.display())]
    Model {
        path: PathBuf,
        #[source]
        source: gltf::Error,
    },
    #[error("model {} contains no triangles", .0.display())]
    EmptyModel(PathBuf),
    #[error("unsupported resource location {0}")]
    UnsupportedScheme(String),
    #[error("loader returned a {0} where another kind of asset was expected")]
    WrongKind(&'static str),
    #[error("load ended without a result")]
    Cancelled,
}

pub type LoadFuture = Pin<Box<dyn Future<Output = Result<Asset, AssetError>> + Send>>;

pub trait AssetLoader: Send + Sync {
    fn load(&self, resource: &Resource) -> LoadFuture;
}

/// Loads textures and models from the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsAssetLoader;

impl AssetLoader for FsAssetLoader {
    fn load(&self, resource: &Resource) -> LoadFuture {
        let resource = resource.clone();
        Box::pin(async move {
            match resource {
                Resource::Texture(location) => load_texture(&location).await.map(Asset::Texture),
                Resource::Model(path) => load_model(path).await.map(Asset::Model),
            }
        })
    }
}

/// Maps a texture location to a local path. Only bare paths and `file://`
/// URLs are understood.
pub fn resolve_path(location: &str) -> Result<PathBuf, AssetError> {
    match location.split_once("://") {
        None => Ok(PathBuf::from(location)),
        Some(("file", path)) => Ok(PathBuf::from(path)),
        Some(_) => Err(AssetError::UnsupportedScheme(location.to_owned())),
    }
}

pub async fn load_texture(location: &str) -> Result<TextureData, AssetError> {
    let path = resolve_path(location)?;
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|source| AssetError::Io {
            path: path.clone(),
            source,
        })?;

    let image = image::load_from_memory(&bytes)
        .map_err(|source| AssetError::Decode {
            path: path.clone(),
            source,
        })?
        .to_rgba8();
    let (width, height) = image.dimensions();
    info!("Loaded texture {} ({}x{})", path.display(), width, height);

    Ok(TextureData {
        width,
        height,
        rgba: image.into_raw(),
    })
}

pub async fn load_model(path: PathBuf) -> Result<ModelData, AssetError> {
    tokio::task::spawn_blocking(move || import_model(&path))
        .await
        .map_err(|_| AssetError::Cancelled)?
}

/// Flattens every triangle primitive of the default scene into one mesh in
/// scene space. Vertex colors come from the material base color factor and
/// the first base color texture found becomes the model's texture.
pub fn import_model(path: &Path) -> Result<ModelData, AssetError> {
    let (document, buffers, images) =
        gltf::import(path).map_err(|source| AssetError::Model {
            path: path.to_owned(),
            source,
        })?;

    let mut model = ModelData {
        mesh: MeshData::default(),
        texture: None,
    };
    if let Some(scene) = document
        .default_scene()
        .or_else(|| document.scenes().next())
    {
        for node in scene.nodes() {
            collect_node(&node, Mat4::IDENTITY, &buffers, &images, &mut model);
        }
    }

    if model.mesh.indices.is_empty() {
        return Err(AssetError::EmptyModel(path.to_owned()));
    }
    info!(
        "Imported model {} ({} triangles, radius {:.2}, {})",
        path.display(),
        model.mesh.triangle_count(),
        model.mesh.bounding_radius(),
        if model.texture.is_some() {
            "textured"
        } else {
            "untextured"
        }
    );
    Ok(model)
}

/// Expands decoded glTF image data to RGBA8.
fn rgba_texture(image: &gltf::image::Data) -> Option<TextureData> {
    use gltf::image::Format;

    let rgba: Vec<u8> = match image.format {
        Format::R8G8B8A8 => image.pixels.clone(),
        Format::R8G8B8 => image
            .pixels
            .chunks_exact(3)
            .flat_map(|p| [p[0], p[1], p[2], 255])
            .collect(),
        Format::R8G8 => image
            .pixels
            .chunks_exact(2)
            .flat_map(|p| [p[0], p[0], p[0], p[1]])
            .collect(),
        Format::R8 => image.pixels.iter().flat_map(|&l| [l, l, l, 255]).collect(),
        other => {
            warn!("Skipping base color texture in unsupported format {:?}", other);
            return None;
        }
    };

    if rgba.len() != image.width as usize * image.height as usize * 4 {
        warn!("Skipping base color texture with inconsistent size");
        return None;
    }
    Some(TextureData {
        width: image.width,
        height: image.height,
        rgba,
    })
}

fn collect_node(
    node: &gltf::Node,
    parent: Mat4,
    buffers: &[gltf::buffer::Data],
    images: &[gltf::image::Data],
    model: &mut ModelData,
) {
    let transform = parent * Mat4::from_cols_array_2d(&node.transform().matrix());
    let normal_matrix = transform.inverse().transpose();

    if let Some(node_mesh) = node.mesh() {
        for primitive in node_mesh.primitives() {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                debug!("Skipping {:?} primitive", primitive.mode());
                continue;
            }

            let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()].0[..]));
            let positions: Vec<Vec3> = match reader.read_positions() {
                Some(positions) => positions.map(Vec3::from).collect(),
                None => continue,
            };
            let normals: Vec<Vec3> = reader
                .read_normals()
                .map(|normals| normals.map(Vec3::from).collect())
                .unwrap_or_default();
            let indices: Vec<u32> = match reader.read_indices() {
                Some(indices) => indices.into_u32().collect(),
                None => (0..positions.len() as u32).collect(),
            };
            let pbr = primitive.material().pbr_metallic_roughness();
            let color = pbr.base_color_factor();
            let base_color_texture = pbr.base_color_texture();
            let uvs: Vec<[f32; 2]> = base_color_texture
                .as_ref()
                .and_then(|info| reader.read_tex_coords(info.tex_coord()))
                .map(|coords| coords.into_f32().collect())
                .unwrap_or_default();
            if model.texture.is_none() {
                model.texture = base_color_texture
                    .as_ref()
                    .and_then(|info| images.get(info.texture().source().index()))
                    .and_then(rgba_texture);
            }

            let vertices = positions
                .iter()
                .enumerate()
                .map(|(i, &position)| {
                    let normal = normals
                        .get(i)
                        .map(|&n| normal_matrix.transform_vector3(n).normalize_or_zero())
                        .unwrap_or(Vec3::ZERO);
                    let uv = uvs.get(i).copied().unwrap_or_default();
                    MeshVertex::new(transform.transform_point3(position), normal, color)
                        .with_uv(uv)
                })
                .collect();

            model.mesh.append(MeshData { vertices, indices });
        }
    }

    for child in node.children() {
        collect_node(&child, transform, buffers, images, model);
    }
}

#[derive(Debug)]
pub enum LoadStatus<T> {
    Pending,
    Loaded(T),
    Failed(AssetError),
}

/// An in-flight load running on the async runtime.
///
/// Dropping it aborts the task, which is the only way to cancel a load.
/// Aborting stops async work at its next await point but cannot interrupt a
/// glTF import already running on the blocking pool; that import finishes in
/// the background and its result is discarded with the closed channel.
#[derive(Debug)]
pub struct PendingLoad<T> {
    receiver: oneshot::Receiver<Result<T, AssetError>>,
    task: JoinHandle<()>,
}

impl<T: Send + 'static> PendingLoad<T> {
    pub fn spawn<F>(runtime: &Handle, future: F, on_settled: Invalidator) -> Self
    where
        F: Future<Output = Result<T, AssetError>> + Send + 'static,
    {
        let (sender, receiver) = oneshot::channel();
        let task = runtime.spawn(async move {
            let result = future.await;
            if sender.send(result).is_ok() {
                on_settled();
            }
        });
        Self { receiver, task }
    }

    /// Never blocks. Once a result has been taken, later polls report
    /// `Cancelled`.
    pub fn poll(&mut self) -> LoadStatus<T> {
        match self.receiver.try_recv() {
            Ok(Ok(value)) => LoadStatus::Loaded(value),
            Ok(Err(e)) => LoadStatus::Failed(e),
            Err(TryRecvError::Empty) => LoadStatus::Pending,
            Err(TryRecvError::Closed) => LoadStatus::Failed(AssetError::Cancelled),
        }
    }
}

impl<T> Drop for PendingLoad<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

use std::{f64::consts::TAU, path::PathBuf, sync::Arc};

use glam::{vec3, Mat4, Vec3};
use log::{debug, info, warn};
use tokio::runtime::Handle;

use crate::{
    assets::{Asset, AssetError, AssetLoader, LoadStatus, PendingLoad, Resource, TextureData},
    entity::{Camera, Decal, MeshMaterial, PointMaterial, Transform},
    frame::{FrameLoop, FrameSubscription, Invalidator},
    geometry::{icosahedron, spinner_ring, MeshData},
    motion::{FloatMotion, OrbitControls},
    particle_field::ParticleField,
    rotation::RotationState,
    window::Rect,
};

const SPINNER_POINTS: usize = 12;
const SPINNER_RADIUS: f32 = 0.6;
const SPINNER_PERIOD: f64 = 1.2;

const BALL_SCALE: f32 = 2.75;
const PLANET_SCALE: f32 = 2.5;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewportId(pub u32);

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ViewportState {
    Unmounted,
    Loading,
    Ready,
    Failed,
}

/// What a viewport needs from its host while mounting.
#[derive(Clone)]
pub struct MountContext {
    pub runtime: Handle,
    pub loader: Arc<dyn AssetLoader>,
    pub invalidate: Invalidator,
}

#[derive(Debug, Clone, PartialEq)]
enum Kind {
    Stars,
    Ball { texture: String },
    Planet { model: PathBuf },
}

impl Kind {
    fn resource(&self) -> Option<Resource> {
        match self {
            Kind::Stars => None,
            Kind::Ball { texture } => Some(Resource::Texture(texture.clone())),
            Kind::Planet { model } => Some(Resource::Model(model.clone())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Stars {
    pub field: ParticleField,
    pub rotation: RotationState,
    pub material: PointMaterial,
    pub camera: Camera,
}

#[derive(Debug, Clone)]
pub struct Ball {
    pub mesh: MeshData,
    pub texture: TextureData,
    pub motion: FloatMotion,
    pub orbit: OrbitControls,
    pub material: MeshMaterial,
    pub decal: Decal,
    pub camera: Camera,
}

#[derive(Debug, Clone)]
pub struct Planet {
    pub mesh: MeshData,
    pub texture: Option<TextureData>,
    pub orbit: OrbitControls,
    pub material: MeshMaterial,
    pub camera: Camera,
}

#[derive(Debug, Clone)]
pub enum Scene {
    Stars(Stars),
    Ball(Ball),
    Planet(Planet),
}

/// Spinning ring of dots shown while a resource loads.
#[derive(Debug, Clone)]
pub struct Placeholder {
    points: Vec<f32>,
    spin: f64,
}

impl Placeholder {
    fn new() -> Self {
        Self {
            points: spinner_ring(SPINNER_POINTS, SPINNER_RADIUS),
            spin: 0.,
        }
    }

    fn advance(&mut self, delta: f64) {
        self.spin = (self.spin + delta * TAU / SPINNER_PERIOD).rem_euclid(TAU);
    }

    pub fn points(&self) -> &[f32] {
        &self.points
    }
}

#[derive(Debug)]
enum Lifecycle {
    Unmounted,
    Loading {
        load: PendingLoad<Asset>,
        placeholder: Placeholder,
    },
    Ready(Scene),
    Failed {
        error: AssetError,
        placeholder: Placeholder,
    },
}

/// Everything the renderer needs to draw one viewport for one frame.
#[derive(Debug)]
pub enum Drawable<'a> {
    Points {
        positions: &'a [f32],
        model: Mat4,
        camera: Camera,
        material: PointMaterial,
    },
    Mesh {
        mesh: &'a MeshData,
        texture: Option<&'a TextureData>,
        decal: Option<Mat4>,
        model: Mat4,
        camera: Camera,
        material: MeshMaterial,
    },
}

/// A 3D surface embedded in the page.
///
/// Owns its camera, its content and its frame subscription. Content is
/// created on mount and dropped on unmount; every change that needs new GPU
/// resources bumps `revision`.
#[derive(Debug)]
pub struct Viewport {
    id: ViewportId,
    kind: Kind,
    rect: Rect,
    lifecycle: Lifecycle,
    subscription: FrameSubscription,
    revision: u64,
}

impl Viewport {
    fn new(id: ViewportId, kind: Kind, rect: Rect) -> Self {
        Self {
            id,
            kind,
            rect,
            lifecycle: Lifecycle::Unmounted,
            subscription: FrameSubscription::default(),
            revision: 0,
        }
    }

    /// Background starfield. Needs no external resource.
    pub fn stars(id: ViewportId, rect: Rect) -> Self {
        Self::new(id, Kind::Stars, rect)
    }

    /// Floating icosahedron with a decal texture.
    pub fn ball(id: ViewportId, rect: Rect, texture: impl Into<String>) -> Self {
        Self::new(
            id,
            Kind::Ball {
                texture: texture.into(),
            },
            rect,
        )
    }

    /// Auto rotating glTF model.
    pub fn planet(id: ViewportId, rect: Rect, model: impl Into<PathBuf>) -> Self {
        Self::new(
            id,
            Kind::Planet {
                model: model.into(),
            },
            rect,
        )
    }

    pub fn id(&self) -> ViewportId {
        self.id
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn state(&self) -> ViewportState {
        match self.lifecycle {
            Lifecycle::Unmounted => ViewportState::Unmounted,
            Lifecycle::Loading { .. } => ViewportState::Loading,
            Lifecycle::Ready(_) => ViewportState::Ready,
            Lifecycle::Failed { .. } => ViewportState::Failed,
        }
    }

    pub fn is_mounted(&self) -> bool {
        !matches!(self.lifecycle, Lifecycle::Unmounted)
    }

    #[cfg(test)]
    pub fn scene(&self) -> Option<&Scene> {
        match &self.lifecycle {
            Lifecycle::Ready(scene) => Some(scene),
            _ => None,
        }
    }

    #[cfg(test)]
    pub fn stars_scene(&self) -> Option<&Stars> {
        match self.scene() {
            Some(Scene::Stars(stars)) => Some(stars),
            _ => None,
        }
    }

    #[cfg(test)]
    pub fn placeholder(&self) -> Option<&Placeholder> {
        match &self.lifecycle {
            Lifecycle::Loading { placeholder, .. } | Lifecycle::Failed { placeholder, .. } => {
                Some(placeholder)
            }
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&AssetError> {
        match &self.lifecycle {
            Lifecycle::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    #[cfg(test)]
    pub fn frames_received(&self) -> u64 {
        self.subscription.frames()
    }

    /// Creates fresh content. Mounting an already mounted viewport remounts
    /// it, so the starfield is sampled again.
    pub fn mount(&mut self, context: &MountContext) {
        if self.is_mounted() {
            self.unmount();
        }

        self.lifecycle = match self.kind.resource() {
            None => Lifecycle::Ready(self.build_stars()),
            Some(resource) => {
                info!("Viewport {:?} loading {:?}", self.id, resource);
                let load = PendingLoad::spawn(
                    &context.runtime,
                    context.loader.load(&resource),
                    context.invalidate.clone(),
                );
                Lifecycle::Loading {
                    load,
                    placeholder: Placeholder::new(),
                }
            }
        };
        self.subscription.subscribe();
        self.revision += 1;
        info!("Viewport {:?} mounted ({:?})", self.id, self.state());
    }

    /// Drops all content. An in-flight load is aborted.
    pub fn unmount(&mut self) {
        if !self.is_mounted() {
            return;
        }
        self.lifecycle = Lifecycle::Unmounted;
        self.subscription.unsubscribe();
        self.revision += 1;
        info!(
            "Viewport {:?} unmounted after {} frames",
            self.id,
            self.subscription.frames()
        );
    }

    /// Checks an in-flight load without blocking. Returns true when the state
    /// changed; a failure is then available from `failure`.
    pub fn update(&mut self) -> bool {
        let status = match &mut self.lifecycle {
            Lifecycle::Loading { load, .. } => load.poll(),
            _ => return false,
        };

        let outcome = match status {
            LoadStatus::Pending => return false,
            LoadStatus::Loaded(asset) => self.build_scene(asset),
            LoadStatus::Failed(error) => Err(error),
        };

        self.lifecycle = match outcome {
            Ok(scene) => {
                info!("Viewport {:?} ready", self.id);
                Lifecycle::Ready(scene)
            }
            Err(error) => {
                let placeholder = match std::mem::replace(&mut self.lifecycle, Lifecycle::Unmounted)
                {
                    Lifecycle::Loading { placeholder, .. } => placeholder,
                    _ => Placeholder::new(),
                };
                Lifecycle::Failed { error, placeholder }
            }
        };
        self.revision += 1;
        true
    }

    /// Frame callback. Ignored unless the viewport is mounted.
    pub fn frame(&mut self, delta: f64) {
        let delta = match self.subscription.dispatch(delta) {
            Some(delta) => delta,
            None => return,
        };

        match &mut self.lifecycle {
            Lifecycle::Ready(Scene::Stars(stars)) => stars.rotation.advance(delta),
            Lifecycle::Ready(Scene::Ball(ball)) => ball.motion.advance(delta),
            Lifecycle::Ready(Scene::Planet(planet)) => {
                planet.orbit.advance(delta);
                planet.camera.position = planet.orbit.position();
            }
            Lifecycle::Loading { placeholder, .. } => placeholder.advance(delta),
            Lifecycle::Failed { .. } | Lifecycle::Unmounted => (),
        }
    }

    /// Whether a pointer drag would orbit this viewport's camera.
    pub fn accepts_drag(&self) -> bool {
        matches!(
            self.lifecycle,
            Lifecycle::Ready(Scene::Ball(_) | Scene::Planet(_))
        )
    }

    /// Orbits the camera by the given angles in radians, within the scene's
    /// polar limits. Returns false when nothing can be dragged.
    pub fn drag(&mut self, d_azimuth: f64, d_polar: f64) -> bool {
        let (orbit, camera) = match &mut self.lifecycle {
            Lifecycle::Ready(Scene::Ball(ball)) => (&mut ball.orbit, &mut ball.camera),
            Lifecycle::Ready(Scene::Planet(planet)) => (&mut planet.orbit, &mut planet.camera),
            _ => return false,
        };
        orbit.rotate(d_azimuth, d_polar);
        camera.position = orbit.position();
        true
    }

    /// Every mounted scene here animates, so only idle viewports can render on
    /// demand.
    pub fn frame_loop(&self) -> FrameLoop {
        match &self.lifecycle {
            Lifecycle::Ready(Scene::Planet(planet)) if !planet.orbit.animates() => FrameLoop::Demand,
            Lifecycle::Ready(_) | Lifecycle::Loading { .. } => FrameLoop::Always,
            Lifecycle::Failed { .. } | Lifecycle::Unmounted => FrameLoop::Demand,
        }
    }

    pub fn drawable(&self) -> Option<Drawable<'_>> {
        match &self.lifecycle {
            Lifecycle::Unmounted => None,
            Lifecycle::Loading { placeholder, .. } | Lifecycle::Failed { placeholder, .. } => {
                Some(Drawable::Points {
                    positions: placeholder.points(),
                    model: Mat4::from_rotation_z(-placeholder.spin as f32),
                    camera: Camera::default(),
                    material: PointMaterial::spinner(),
                })
            }
            Lifecycle::Ready(Scene::Stars(stars)) => Some(Drawable::Points {
                positions: stars.field.positions(),
                model: Mat4::from_quat(stars.rotation.orientation()),
                camera: stars.camera,
                material: stars.material,
            }),
            Lifecycle::Ready(Scene::Ball(ball)) => Some(Drawable::Mesh {
                mesh: &ball.mesh,
                texture: Some(&ball.texture),
                decal: Some(ball.decal.projection()),
                model: Transform {
                    position: vec3(0., ball.motion.offset_y(), 0.),
                    rotation: ball.motion.rotation(),
                    scale: Vec3::splat(BALL_SCALE),
                }
                .matrix(),
                camera: ball.camera,
                material: ball.material,
            }),
            Lifecycle::Ready(Scene::Planet(planet)) => Some(Drawable::Mesh {
                mesh: &planet.mesh,
                texture: planet.texture.as_ref(),
                decal: None,
                model: Transform {
                    scale: Vec3::splat(PLANET_SCALE),
                    ..Default::default()
                }
                .matrix(),
                camera: planet.camera,
                material: planet.material,
            }),
        }
    }

    fn build_stars(&self) -> Scene {
        let field = ParticleField::starfield();
        debug!(
            "Viewport {:?} sampled {} stars within radius {}",
            self.id,
            field.len(),
            field.radius()
        );
        Scene::Stars(Stars {
            field,
            rotation: RotationState::new(),
            material: PointMaterial::stars(),
            camera: Camera {
                position: vec3(0., 0., 1.),
                ..Default::default()
            },
        })
    }

    fn build_scene(&self, asset: Asset) -> Result<Scene, AssetError> {
        match (&self.kind, asset) {
            (Kind::Ball { .. }, Asset::Texture(texture)) => {
                let camera = Camera::default();
                Ok(Scene::Ball(Ball {
                    mesh: icosahedron(1., 1),
                    texture,
                    motion: FloatMotion::ball(&mut rand::thread_rng()),
                    orbit: OrbitControls::from_position(camera.position, Vec3::ZERO),
                    material: MeshMaterial::ball(),
                    decal: Decal::front(),
                    camera,
                }))
            }
            (Kind::Planet { .. }, Asset::Model(model)) => {
                let orbit = OrbitControls::from_position(vec3(-4., 3., 6.), Vec3::ZERO)
                    .horizontal()
                    .auto_rotate(2.);
                Ok(Scene::Planet(Planet {
                    mesh: model.mesh,
                    texture: model.texture,
                    orbit,
                    material: MeshMaterial::planet(),
                    camera: Camera {
                        position: orbit.position(),
                        fov: 45.,
                        near: 0.1,
                        far: 200.,
                        ..Default::default()
                    },
                }))
            }
            (kind, asset) => {
                warn!("Viewport {:?} ({:?}) received a {}", self.id, kind, asset.kind());
                Err(AssetError::WrongKind(asset.kind()))
            }
        }
    }
}

impl Drop for Viewport {
    fn drop(&mut self) {
        self.unmount();
    }
}

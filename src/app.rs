use std::{f64::consts::TAU, time::Instant};

use anyhow::Result;
use log::{debug, error, info};
use winit::{
    dpi::PhysicalPosition,
    event::{ElementState, VirtualKeyCode},
    window::Window,
};

use crate::{
    config::Content,
    frame::{FrameClock, FrameLoop},
    renderer::Renderer,
    viewport::{MountContext, Viewport, ViewportId},
    window::{Rect, Size},
};

const GLOBE_RECT: Rect = Rect {
    x: 0.5,
    y: 0.05,
    width: 0.5,
    height: 0.65,
};
const BALL_ROW_Y: f32 = 0.75;
const BALL_ROW_HEIGHT: f32 = 0.2;
const MAX_BALL_WIDTH: f32 = 0.15;

/// Lays the page out back to front: the starfield covers the whole window,
/// the globe sits on the right and the technology balls form a centered row
/// along the bottom.
pub fn layout(content: &Content) -> Vec<Viewport> {
    let mut ids = (0..).map(ViewportId);
    let mut next_id = || ids.next().unwrap_or(ViewportId(u32::MAX));

    let mut viewports = vec![Viewport::stars(next_id(), Rect::FULL)];

    if let Some(model) = &content.earth_model {
        viewports.push(Viewport::planet(next_id(), GLOBE_RECT, model.clone()));
    }

    let count = content.technologies.len();
    if count > 0 {
        let width = (1. / count as f32).min(MAX_BALL_WIDTH);
        let start = (1. - width * count as f32) * 0.5;
        for (i, technology) in content.technologies.iter().enumerate() {
            let rect = Rect::new(start + width * i as f32, BALL_ROW_Y, width, BALL_ROW_HEIGHT);
            viewports.push(Viewport::ball(next_id(), rect, technology.icon.clone()));
        }
    }

    viewports
}

/// Topmost draggable viewport under the cursor.
pub fn drag_target(viewports: &[Viewport], size: Size, x: f64, y: f64) -> Option<ViewportId> {
    viewports
        .iter()
        .rev()
        .filter(|viewport| viewport.accepts_drag())
        .find(|viewport| viewport.rect().to_pixels(size).contains(x, y))
        .map(Viewport::id)
}

/// Converts a cursor movement in pixels into orbit angles. Dragging across
/// the full height of a viewport turns it once.
pub fn drag_angles(dx: f64, dy: f64, viewport_height: u32) -> (f64, f64) {
    if viewport_height == 0 {
        return (0., 0.);
    }
    let scale = TAU / viewport_height as f64;
    (dx * scale, dy * scale)
}

#[derive(Debug, Clone, Copy)]
struct Drag {
    target: ViewportId,
    last: PhysicalPosition<f64>,
}

/// The page keeps rendering as long as any viewport animates.
pub fn frame_loop(viewports: &[Viewport]) -> FrameLoop {
    viewports
        .iter()
        .map(Viewport::frame_loop)
        .fold(FrameLoop::Demand, FrameLoop::merge)
}

pub struct App {
    window: Window,
    renderer: Renderer,
    viewports: Vec<Viewport>,
    context: MountContext,
    clock: FrameClock,
    last_frame_loop: FrameLoop,
    cursor: Option<PhysicalPosition<f64>>,
    drag: Option<Drag>,
}

impl App {
    pub async fn new(window: Window, content: &Content, context: MountContext) -> Result<Self> {
        let renderer = Renderer::new(&window).await?;

        let mut viewports = layout(content);
        info!("Mounting {} viewports", viewports.len());
        for viewport in &mut viewports {
            viewport.mount(&context);
        }

        Ok(Self {
            window,
            renderer,
            viewports,
            context,
            clock: FrameClock::new(),
            last_frame_loop: FrameLoop::Always,
            cursor: None,
            drag: None,
        })
    }

    pub fn on_resize(&mut self, size: winit::dpi::PhysicalSize<u32>) {
        let size = Size::from(size);
        debug!("Resized to {:?}", size);
        self.renderer.resize(size);
        self.window.request_redraw();
    }

    pub fn on_key_up(&mut self, keycode: VirtualKeyCode) {
        if keycode == VirtualKeyCode::R {
            self.remount();
        }
    }

    pub fn on_mouse_input(&mut self, state: ElementState) {
        self.drag = match (state, self.cursor) {
            (ElementState::Pressed, Some(cursor)) => {
                let size = Size::from(self.window.inner_size());
                drag_target(&self.viewports, size, cursor.x, cursor.y).map(|target| {
                    debug!("Dragging viewport {:?}", target);
                    Drag {
                        target,
                        last: cursor,
                    }
                })
            }
            _ => None,
        };
    }

    pub fn on_cursor_moved(&mut self, position: PhysicalPosition<f64>) {
        self.cursor = Some(position);
        let drag = match &mut self.drag {
            Some(drag) => drag,
            None => return,
        };
        let (dx, dy) = (position.x - drag.last.x, position.y - drag.last.y);
        drag.last = position;

        let size = Size::from(self.window.inner_size());
        let viewport = self
            .viewports
            .iter_mut()
            .find(|viewport| viewport.id() == drag.target);
        let dragged = viewport.map_or(false, |viewport| {
            let (d_azimuth, d_polar) = drag_angles(dx, dy, viewport.rect().to_pixels(size).height);
            viewport.drag(d_azimuth, d_polar)
        });

        if dragged {
            self.window.request_redraw();
        } else {
            self.drag = None;
        }
    }

    /// Unmounts and mounts every viewport again, which resamples the
    /// starfield and restarts every load.
    pub fn remount(&mut self) {
        info!("Remounting all viewports");
        self.drag = None;
        for viewport in &mut self.viewports {
            viewport.unmount();
            viewport.mount(&self.context);
        }
        self.clock.reset();
        self.window.request_redraw();
    }

    pub fn request_redraw(&self) {
        self.window.request_redraw();
    }

    pub fn frame_loop(&self) -> FrameLoop {
        frame_loop(&self.viewports)
    }

    /// Settles finished loads and advances every subscribed animator by the
    /// time since the previous frame.
    pub fn frame(&mut self, now: Instant) {
        if self.last_frame_loop == FrameLoop::Demand {
            self.clock.reset();
        }
        let delta = self.clock.tick(now);

        for viewport in &mut self.viewports {
            if viewport.update() {
                if let Some(e) = viewport.failure() {
                    error!("Viewport {:?} failed to load: {}", viewport.id(), e);
                }
            }
            viewport.frame(delta);
        }

        self.last_frame_loop = self.frame_loop();
    }

    pub fn render(&mut self) -> Result<()> {
        self.renderer.render(&self.viewports)
    }
}

#[cfg(test)]
mod tests {
    use std::{path::PathBuf, sync::Arc};

    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::{
        assets::{Asset, AssetLoader, FsAssetLoader, LoadFuture, Resource, TextureData},
        config::Technology,
        frame::noop_invalidator,
        viewport::ViewportState,
    };

    struct SolidTextureLoader;

    impl AssetLoader for SolidTextureLoader {
        fn load(&self, _resource: &Resource) -> LoadFuture {
            Box::pin(async { Ok(Asset::Texture(TextureData::solid([255; 4]))) })
        }
    }

    fn technologies(count: usize) -> Vec<Technology> {
        (0..count)
            .map(|i| Technology {
                name: format!("tech {}", i),
                icon: format!("icons/{}.png", i),
            })
            .collect()
    }

    #[test]
    fn starfield_only_without_content() {
        let viewports = layout(&Content::default());
        assert_eq!(viewports.len(), 1);
        assert_eq!(viewports[0].rect(), Rect::FULL);
    }

    #[test]
    fn stars_come_first_then_globe_then_balls() {
        let content = Content {
            earth_model: Some(PathBuf::from("planet/scene.gltf")),
            technologies: technologies(3),
        };
        let viewports = layout(&content);

        assert_eq!(viewports.len(), 5);
        assert_eq!(viewports[0].rect(), Rect::FULL);
        assert_eq!(viewports[1].rect(), GLOBE_RECT);

        let ids: Vec<_> = viewports.iter().map(Viewport::id).collect();
        assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn balls_stay_inside_the_window() {
        for count in [1, 4, 12] {
            let content = Content {
                earth_model: None,
                technologies: technologies(count),
            };
            for viewport in &layout(&content)[1..] {
                let rect = viewport.rect();
                assert!(rect.x >= 0. && rect.x + rect.width <= 1. + 1e-5);
                assert!(rect.width <= MAX_BALL_WIDTH + 1e-5);
                assert_eq!(rect.y, BALL_ROW_Y);
            }
        }
    }

    #[tokio::test]
    async fn page_renders_on_demand_only_when_idle() {
        let context = MountContext {
            runtime: tokio::runtime::Handle::current(),
            loader: Arc::new(FsAssetLoader),
            invalidate: noop_invalidator(),
        };
        let mut viewports = layout(&Content::default());
        assert_eq!(frame_loop(&viewports), FrameLoop::Demand);

        viewports[0].mount(&context);
        assert_eq!(viewports[0].state(), ViewportState::Ready);
        assert_eq!(frame_loop(&viewports), FrameLoop::Always);

        viewports[0].unmount();
        assert_eq!(frame_loop(&viewports), FrameLoop::Demand);
    }

    #[tokio::test]
    async fn drags_go_to_the_ball_under_the_cursor() {
        let context = MountContext {
            runtime: tokio::runtime::Handle::current(),
            loader: Arc::new(SolidTextureLoader),
            invalidate: noop_invalidator(),
        };
        let content = Content {
            earth_model: None,
            technologies: technologies(2),
        };
        let size = Size {
            width: 1000,
            height: 500,
        };
        let mut viewports = layout(&content);
        for viewport in &mut viewports {
            viewport.mount(&context);
        }
        // Balls span x 350..500 and 500..650, y 375..475.
        assert_eq!(drag_target(&viewports, size, 400., 400.), None);

        for _ in 0..1000 {
            tokio::task::yield_now().await;
            viewports.iter_mut().for_each(|viewport| {
                viewport.update();
            });
            if viewports.iter().all(|v| v.state() == ViewportState::Ready) {
                break;
            }
        }
        assert!(viewports.iter().all(|v| v.state() == ViewportState::Ready));

        assert_eq!(drag_target(&viewports, size, 400., 400.), Some(viewports[1].id()));
        assert_eq!(drag_target(&viewports, size, 560., 400.), Some(viewports[2].id()));
        assert_eq!(drag_target(&viewports, size, 100., 100.), None);
    }

    #[test]
    fn full_height_drag_is_one_turn() {
        let (d_azimuth, d_polar) = drag_angles(100., -25., 100);
        assert_abs_diff_eq!(d_azimuth, TAU, epsilon = 1e-12);
        assert_abs_diff_eq!(d_polar, -TAU / 4., epsilon = 1e-12);
        assert_eq!(drag_angles(10., 10., 0), (0., 0.));
    }
}

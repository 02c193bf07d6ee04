use std::{
    sync::{Arc, Mutex},
    time::Instant,
};

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};
use pollster::FutureExt as _;
use winit::{
    dpi::LogicalSize,
    event::{ElementState, Event, KeyboardInput, MouseButton, VirtualKeyCode, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
    window::WindowBuilder,
};

mod app;
mod assets;
mod config;
mod entity;
mod frame;
mod geometry;
mod motion;
mod particle_field;
mod renderer;
mod rotation;
mod viewport;
mod window;

use app::App;
use assets::FsAssetLoader;
use config::{Args, Content};
use frame::{FrameLoop, TARGET_FRAME_INTERVAL};
use viewport::MountContext;

#[derive(Debug, Clone, Copy)]
enum AppEvent {
    /// Something outside the frame loop changed what is on screen.
    Invalidate,
}

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();
    let content = match &args.content {
        Some(path) => Content::load(path)?,
        None => {
            info!("No content file given, showing the starfield only");
            Content::default()
        }
    };

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;

    let event_loop = EventLoop::<AppEvent>::with_user_event();

    let window = WindowBuilder::new()
        .with_title(args.title.as_str())
        .with_inner_size(LogicalSize::<u32> {
            width: args.width,
            height: args.height,
        })
        .build(&event_loop)
        .context("Failed to build window")?;

    let proxy = Mutex::new(event_loop.create_proxy());
    let invalidate = frame::invalidator(move || match proxy.lock() {
        Ok(proxy) => proxy
            .send_event(AppEvent::Invalidate)
            .map_err(|e| e.to_string()),
        Err(_) => Err("event loop proxy poisoned".to_owned()),
    });

    let context = MountContext {
        runtime: runtime.handle().clone(),
        loader: Arc::new(FsAssetLoader),
        invalidate,
    };

    let mut app = App::new(window, &content, context).block_on()?;

    let mut last_render_inst = Instant::now();

    event_loop.run(move |e, _, control_flow| {
        // Loads run on this runtime for as long as the window is open.
        let _ = &runtime;

        match e {
            Event::WindowEvent { event, .. } => match event {
                WindowEvent::CloseRequested => *control_flow = ControlFlow::Exit,
                WindowEvent::Resized(size) => app.on_resize(size),
                WindowEvent::ScaleFactorChanged { new_inner_size, .. } => {
                    app.on_resize(*new_inner_size)
                }
                WindowEvent::KeyboardInput {
                    input:
                        KeyboardInput {
                            state: ElementState::Released,
                            virtual_keycode: Some(keycode),
                            ..
                        },
                    ..
                } => match keycode {
                    VirtualKeyCode::Escape => *control_flow = ControlFlow::Exit,
                    keycode => app.on_key_up(keycode),
                },
                WindowEvent::MouseInput {
                    state,
                    button: MouseButton::Left,
                    ..
                } => app.on_mouse_input(state),
                WindowEvent::CursorMoved { position, .. } => app.on_cursor_moved(position),
                WindowEvent::CursorLeft { .. } => app.on_mouse_input(ElementState::Released),
                _ => (),
            },
            Event::UserEvent(AppEvent::Invalidate) => app.request_redraw(),
            Event::MainEventsCleared => match app.frame_loop() {
                FrameLoop::Always => {
                    let elapsed_from_last_draw = last_render_inst.elapsed();
                    if TARGET_FRAME_INTERVAL > elapsed_from_last_draw {
                        let wait = TARGET_FRAME_INTERVAL - elapsed_from_last_draw;
                        *control_flow = ControlFlow::WaitUntil(Instant::now() + wait);
                        return;
                    }
                    *control_flow = ControlFlow::Poll;
                    app.request_redraw();
                }
                FrameLoop::Demand => *control_flow = ControlFlow::Wait,
            },
            Event::RedrawRequested(..) => {
                app.frame(Instant::now());
                if let Err(e) = app.render() {
                    error!("{:?}", e);
                    *control_flow = ControlFlow::Exit;
                }
                last_render_inst = Instant::now();
            }
            _ => (),
        }
    });
}

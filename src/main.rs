use anyhow::Result;
use tracing::{error, info, warn};
use triangle_engine::{logging, FrameError, FrameStatus, RenderEngine};
use winit::{
    dpi::PhysicalSize,
    event::{Event, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
    window::{Window, WindowBuilder, WindowButtons},
};

const WINDOW_WIDTH: u32 = 640;
const WINDOW_HEIGHT: u32 = 480;
const WINDOW_TITLE: &str = "Hello, Triangle";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init()?;

    let event_loop = EventLoop::new()?;
    let window = init_window(&event_loop)?;
    let mut app = App {
        engine: RenderEngine::new(&window)?,
        _window: window,
    };

    event_loop.set_control_flow(ControlFlow::Poll);
    event_loop.run(move |event, elwt| match event {
        Event::WindowEvent {
            event: WindowEvent::CloseRequested,
            ..
        } => {
            info!("window close requested");
            elwt.exit();
        }
        Event::AboutToWait => match app.engine.render() {
            Ok(FrameStatus::Presented) => {}
            Ok(FrameStatus::Suboptimal) => {
                warn!("swapchain is suboptimal for the surface");
            }
            Err(FrameError::SwapchainOutOfDate) => {
                // recreation is not supported; stop rendering rather than
                // presenting through a stale swapchain
                error!("swapchain out of date, exiting");
                elwt.exit();
            }
            Err(err) => {
                error!("frame failed: {err}");
                elwt.exit();
            }
        },
        Event::LoopExiting => app.engine.shutdown(),
        _ => {}
    })?;

    Ok(())
}

/// Keeps the window alive exactly as long as the engine drawing to it.
/// The engine drops first, so the surface is destroyed while the native
/// window still exists.
struct App {
    engine: RenderEngine,
    _window: Window,
}

/// The fixed-size window the engine presents into. Dimensions and title
/// are set once at process start; resizing is not supported.
fn init_window(event_loop: &EventLoop<()>) -> Result<Window> {
    let window = WindowBuilder::new()
        .with_inner_size(PhysicalSize::<u32>::from((WINDOW_WIDTH, WINDOW_HEIGHT)))
        .with_resizable(false)
        .with_enabled_buttons(WindowButtons::CLOSE)
        .with_active(true)
        .with_title(WINDOW_TITLE)
        .build(event_loop)?;
    Ok(window)
}

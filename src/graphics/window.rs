use glutin::dpi::LogicalSize;
use glutin::event::{ElementState, Event, KeyboardInput, VirtualKeyCode, WindowEvent};
use glutin::event_loop::{ControlFlow, EventLoop};
use glutin::window::WindowBuilder;
use glutin::{Api, ContextBuilder, GlProfile, GlRequest};

use anyhow::Context;

use gpu::triangle::frame_matrices;
use gpu::Diagnostics;

use std::ffi::c_void;
use std::time::Instant;

use crate::interface::cli::Config;

use super::opengl::GlDevice;
use super::{debug, load_triangle};

const CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// Opens the window and draws until it's closed, Escape is pressed, or the frame limit is hit.
///
/// Never returns once the loop has started; setup failures come back as errors.
pub fn run(config: Config) -> anyhow::Result<()> {
    let events = EventLoop::new();
    let window = WindowBuilder::new()
        .with_title("trigon")
        .with_inner_size(LogicalSize::new(config.width as f64, config.height as f64));

    let context = ContextBuilder::new()
        .with_gl(GlRequest::Specific(Api::OpenGl, (4, 5)))
        .with_gl_profile(GlProfile::Core)
        .with_gl_debug_flag(true)
        .with_vsync(config.vsync)
        .build_windowed(window, &events)
        .context("creating an OpenGL 4.5 core context")?;

    let context = unsafe { context.make_current() }
        .map_err(|(_, e)| e)
        .context("making the OpenGL context current")?;

    let mut device = GlDevice::load_with(|s| context.get_proc_address(s) as *const c_void);
    debug::install();

    let mut diagnostics = Diagnostics::new();
    let mut triangle = Some(load_triangle(&mut device, &config, &mut diagnostics)?);
    diagnostics.clear();

    let size = context.window().inner_size();
    device.viewport(size.width, size.height);

    let frame_limit = config.frame_limit();
    let started = Instant::now();
    let mut frames = 0u64;

    log::info!("drawing; press Escape or close the window to quit");

    events.run(move |event, _, control_flow| {
        *control_flow = ControlFlow::Poll;

        match event {
            Event::WindowEvent { event, .. } => match event {
                WindowEvent::Resized(size) => {
                    context.resize(size);
                    device.viewport(size.width, size.height);
                }
                WindowEvent::CloseRequested => *control_flow = ControlFlow::Exit,
                WindowEvent::KeyboardInput {
                    input: KeyboardInput {
                        state: ElementState::Pressed,
                        virtual_keycode: Some(VirtualKeyCode::Escape),
                        ..
                    },
                    ..
                } => *control_flow = ControlFlow::Exit,
                _ => {}
            },

            Event::MainEventsCleared => context.window().request_redraw(),

            Event::RedrawRequested(_) => {
                let triangle = match triangle.as_mut() {
                    Some(triangle) => triangle,
                    None => return,
                };

                let size = context.window().inner_size();
                if size.width == 0 || size.height == 0 {
                    return;
                }

                let aspect = size.width as f32 / size.height as f32;
                let matrices = frame_matrices(started.elapsed().as_secs_f32(), aspect);

                device.clear(CLEAR_COLOR);
                if let Err(e) = triangle.draw(&mut device, &matrices, &mut diagnostics) {
                    log::error!("{}", e);
                    *control_flow = ControlFlow::ExitWithCode(1);
                    return;
                }
                // Everything in here has already been logged.
                diagnostics.clear();

                if let Err(e) = context.swap_buffers() {
                    log::error!("presenting frame {}: {}", frames, e);
                    *control_flow = ControlFlow::ExitWithCode(1);
                    return;
                }

                frames += 1;
                if frame_limit.map_or(false, |limit| frames >= limit) {
                    *control_flow = ControlFlow::Exit;
                }
            }

            Event::LoopDestroyed => {
                if let Some(triangle) = triangle.take() {
                    triangle.destroy(&mut device);
                }
                log::info!("drew {} frame(s) in {:.2?}", frames, started.elapsed());
            }

            _ => {}
        }
    })
}

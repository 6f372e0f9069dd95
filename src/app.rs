//! Windowed front end: paces a [`Driver`] at the configured tick rate and
//! shows each painted frame.

use crate::config::{WINDOW_HEIGHT, WINDOW_WIDTH};
use crate::render::{Canvas, NullRenderer};
use crate::trainer::{Driver, Progress};
use anyhow::Context;
use pixels::{Pixels, SurfaceTexture};
use std::time::{Duration, Instant};
use tracing::{error, info};
use winit::dpi::LogicalSize;
use winit::event::{Event, VirtualKeyCode};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::window::WindowBuilder;
use winit_input_helper::WinitInputHelper;

const MAX_TICKS_PER_FRAME: u32 = 64;

/// Runs until the driver finishes or the window is closed. Never returns on
/// success; the process exits with the event loop.
pub fn run<D: Driver + 'static>(mut driver: D, title: &str) -> anyhow::Result<()> {
    let event_loop = EventLoop::new();
    let mut input = WinitInputHelper::new();

    let window = WindowBuilder::new()
        .with_title(title)
        .with_inner_size(LogicalSize::new(WINDOW_WIDTH, WINDOW_HEIGHT))
        .with_resizable(false)
        .build(&event_loop)
        .context("failed to create window")?;

    let mut pixels = {
        let window_size = window.inner_size();
        let surface_texture = SurfaceTexture::new(window_size.width, window_size.height, &window);
        Pixels::new(WINDOW_WIDTH, WINDOW_HEIGHT, surface_texture)
            .context("failed to create pixel surface")?
    };

    let game = &driver.session().config.game;
    let mut canvas =
        Canvas::new(WINDOW_WIDTH, WINDOW_HEIGHT).with_target_lines(game.draw_target_lines);
    let tps = game.ticks_per_second.max(1);
    let tick_duration = Duration::from_secs_f64(1.0 / f64::from(tps));
    // Extra simulation ticks squeezed into each paced step (+/- keys).
    let mut ticks_per_frame: u32 = 1;
    let mut last_update = Instant::now();

    event_loop.run(move |event, _, control_flow| {
        *control_flow = ControlFlow::Poll;

        if let Event::RedrawRequested(_) = event {
            pixels.frame_mut().copy_from_slice(canvas.frame());
            if let Err(err) = pixels.render() {
                error!(%err, "failed to present frame");
                *control_flow = ControlFlow::Exit;
                return;
            }
        }

        if input.update(&event) {
            if input.key_pressed(VirtualKeyCode::Escape) || input.close_requested() || input.destroyed() {
                info!("quit requested");
                *control_flow = ControlFlow::Exit;
                return;
            }

            if input.key_pressed(VirtualKeyCode::NumpadAdd) || input.key_pressed(VirtualKeyCode::Equals) {
                ticks_per_frame = (ticks_per_frame * 2).min(MAX_TICKS_PER_FRAME);
                info!(ticks_per_frame, "speed up");
            }
            if input.key_pressed(VirtualKeyCode::NumpadSubtract) || input.key_pressed(VirtualKeyCode::Minus) {
                ticks_per_frame = (ticks_per_frame / 2).max(1);
                info!(ticks_per_frame, "slow down");
            }

            if last_update.elapsed() >= tick_duration {
                last_update = Instant::now();
                for step in 1..=ticks_per_frame {
                    // Only the last tick of a batch is painted.
                    let progress = if step == ticks_per_frame {
                        driver.tick(&mut canvas)
                    } else {
                        driver.tick(&mut NullRenderer)
                    };
                    if progress == Progress::Finished {
                        *control_flow = ControlFlow::Exit;
                        break;
                    }
                }
                window.request_redraw();
            }
        }
    });
}

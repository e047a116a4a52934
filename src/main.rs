use anyhow::Result;
use clap::Parser;
use log::info;
use std::sync::Arc;
use winit::{
    event::{ElementState, Event, WindowEvent},
    event_loop::EventLoop,
    keyboard::{KeyCode, PhysicalKey},
    window::WindowBuilder,
};

use barbershop_stage::app::StageApp;
use barbershop_stage::audio::device;
use barbershop_stage::config::Args;
use barbershop_stage::graphics::GraphicsEngine;
use barbershop_stage::ui::UserInterface;

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if args.list_devices {
        for device in device::list_output_devices()? {
            let marker = if device.is_default { " (default)" } else { "" };
            println!("{}{}", device.name, marker);
        }
        return Ok(());
    }

    info!("Starting Barbershop Stage");

    let mut app = StageApp::new(&args)?;

    let event_loop = EventLoop::new()?;
    let window = Arc::new(WindowBuilder::new()
        .with_title("Barbershop Stage")
        .with_inner_size(winit::dpi::LogicalSize::new(1000, 820))
        .build(&event_loop)?);

    let mut graphics_engine = pollster::block_on(GraphicsEngine::new(&window))?;
    let mut ui = UserInterface::new(&window, &graphics_engine.device, graphics_engine.config.format);

    info!("Stage initialized successfully");

    let window_clone = Arc::clone(&window);
    event_loop.run(move |event, elwt| {
        match event {
            Event::WindowEvent { event, .. } => match event {
                WindowEvent::CloseRequested => {
                    info!("Close requested");
                    elwt.exit();
                }
                WindowEvent::KeyboardInput {
                    event: ref key_event,
                    ..
                } if key_event.physical_key == PhysicalKey::Code(KeyCode::Escape)
                    && key_event.state == ElementState::Pressed =>
                {
                    info!("Escape pressed");
                    elwt.exit();
                }
                WindowEvent::Resized(physical_size) => {
                    graphics_engine.resize(physical_size);
                    ui.handle_event(&event, &window_clone);
                }
                WindowEvent::RedrawRequested => {
                    if let Err(e) = app.render(&mut graphics_engine, &mut ui, &window_clone) {
                        log::error!("Render error: {}", e);
                    }
                }
                _ => {
                    ui.handle_event(&event, &window_clone);
                }
            },
            Event::AboutToWait => {
                window_clone.request_redraw();
            }
            _ => {}
        }
    })?;

    Ok(())
}

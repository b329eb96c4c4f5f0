use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::{Window, WindowId};

use crate::event::Event;

/// Source of platform events for the render loop.
pub trait EventPump {
    /// Processes pending platform events without blocking.
    fn poll_events(&mut self);

    /// Whether the platform asked the loop to stop.
    fn should_close(&self) -> bool;

    /// Events collected since the last call.
    fn take_events(&mut self) -> Vec<Event>;
}

/// Window configuration.
#[derive(Debug, Clone)]
pub struct WindowConfig {
    pub title: String,
    pub size: LogicalSize<f64>,

    /// Off by default: the swapchain is never recreated.
    pub resizable: bool,

    /// Treat a press of Escape as a close request.
    pub close_on_escape: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "bottle".to_string(),
            size: LogicalSize::new(800.0, 600.0),
            resizable: false,
            close_on_escape: true,
        }
    }
}

struct PumpState {
    config: WindowConfig,
    window: Option<Arc<Window>>,
    events: Vec<Event>,
    close_requested: bool,
    error: Option<anyhow::Error>,
}

impl ApplicationHandler for PumpState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(self.config.size)
            .with_resizable(self.config.resizable);

        match event_loop.create_window(attrs) {
            Ok(window) => {
                log::info!("window created: {:?}", window.inner_size());
                self.window = Some(Arc::new(window));
            }
            Err(e) => {
                self.error = Some(anyhow!(e).context("failed to create window"));
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                self.close_requested = true;
                self.events.push(Event::CloseRequested);
                event_loop.exit();
            }
            WindowEvent::Resized(size) => self.events.push(Event::Resized {
                width: size.width,
                height: size.height,
            }),
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state: ElementState::Pressed,
                        repeat: false,
                        ..
                    },
                ..
            } => {
                self.events.push(Event::KeyPressed(code));
                if code == KeyCode::Escape && self.config.close_on_escape {
                    self.close_requested = true;
                    self.events.push(Event::CloseRequested);
                }
            }
            _ => {}
        }
    }
}

/// One window plus the event loop that drives it.
pub struct PlatformWindow {
    event_loop: EventLoop<()>,
    state: PumpState,
    window: Arc<Window>,
}

impl PlatformWindow {
    /// Creates the event loop and pumps it until the window exists.
    pub fn new(config: WindowConfig) -> Result<Self> {
        let mut event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
        let mut state = PumpState {
            config,
            window: None,
            events: Vec::new(),
            close_requested: false,
            error: None,
        };

        let window = loop {
            let status = event_loop.pump_app_events(Some(Duration::from_millis(10)), &mut state);
            if let Some(e) = state.error.take() {
                return Err(e);
            }
            if let Some(window) = &state.window {
                break Arc::clone(window);
            }
            if let PumpStatus::Exit(code) = status {
                return Err(anyhow!(
                    "event loop exited with code {code} before the window was created"
                ));
            }
        };

        Ok(Self {
            event_loop,
            state,
            window,
        })
    }

    pub fn window(&self) -> Arc<Window> {
        Arc::clone(&self.window)
    }
}

impl EventPump for PlatformWindow {
    fn poll_events(&mut self) {
        let status = self
            .event_loop
            .pump_app_events(Some(Duration::ZERO), &mut self.state);
        if let PumpStatus::Exit(code) = status {
            log::debug!("event loop exited with code {code}");
            self.state.close_requested = true;
        }
    }

    fn should_close(&self) -> bool {
        self.state.close_requested
    }

    fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.state.events)
    }
}

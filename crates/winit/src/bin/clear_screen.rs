use anyhow::Context;
use clap::{Parser, ValueEnum};
use log::{error, info};
use rhi::command::{Color, ColorAttachment, QueueType, RenderPassDesc};
use rhi::device::{Debuggers, DeviceConfig, DeviceInstance, GraphicsDevice, PowerPreference};
use rhi::format::PixelFormat;
use rhi::resource::{PresentMode, PresentResult, SwapChainDesc};
use rhi_winit::window_swap_chain::{platform_create_info, WindowSwapChain};
use std::sync::Arc;
use std::time::Instant;
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::window::{Window, WindowId};

/// Opens a window and clears it to a color cycling through the hues.
#[derive(Parser, Debug)]
struct Args {
	/// Exit after presenting this many frames
	#[arg(long)]
	frames: Option<u64>,
	#[arg(long, value_enum, default_value_t = Mode::Fifo)]
	present_mode: Mode,
	#[arg(long, default_value_t = 2)]
	backbuffers: u32,
	/// Also create a Depth32Float depth stencil texture
	#[arg(long)]
	depth: bool,
	#[arg(long)]
	high_performance: bool,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Mode {
	Immediate,
	Mailbox,
	Fifo,
}

impl From<Mode> for PresentMode {
	fn from(value: Mode) -> Self {
		match value {
			Mode::Immediate => PresentMode::Immediate,
			Mode::Mailbox => PresentMode::Mailbox,
			Mode::Fifo => PresentMode::Fifo,
		}
	}
}

struct Running {
	// drop order: swap chain before device
	swap_chain: WindowSwapChain,
	device: DeviceInstance,
}

struct ClearScreen {
	args: Args,
	running: Option<Running>,
	start: Instant,
	frames: u64,
	error: Option<anyhow::Error>,
}

impl ClearScreen {
	fn init(&self, event_loop: &ActiveEventLoop) -> anyhow::Result<Running> {
		let window = Arc::new(
			event_loop.create_window(
				Window::default_attributes()
					.with_title("clear_screen")
					.with_inner_size(LogicalSize::new(800, 600)),
			)?,
		);
		let device = GraphicsDevice::new(
			platform_create_info(event_loop)?,
			&DeviceConfig {
				app: rhi::app_config_from_cargo!(),
				power_preference: if self.args.high_performance {
					PowerPreference::HighPerformance
				} else {
					PowerPreference::Default
				},
				debug: Debuggers::from_env(),
				..DeviceConfig::default()
			},
		)?;
		info!("Running on {:?}", device.adapter());
		let swap_chain = WindowSwapChain::new(
			&device,
			window,
			&SwapChainDesc {
				name: "clear_screen",
				color_format: PixelFormat::BGRA8Unorm,
				depth_stencil_format: if self.args.depth {
					PixelFormat::Depth32Float
				} else {
					PixelFormat::Undefined
				},
				present_mode: self.args.present_mode.into(),
				backbuffer_count: self.args.backbuffers,
				..SwapChainDesc::default()
			},
		)?;
		Ok(Running { swap_chain, device })
	}

	fn render(&mut self) -> anyhow::Result<bool> {
		profiling::function_scope!();
		let running = self.running.as_mut().context("render before init")?;
		let Some(swap_chain) = running.swap_chain.acquire()? else {
			return Ok(true);
		};

		let hue = self.start.elapsed().as_secs_f32() * 0.25 % 1.;
		let mut cmd = running.device.get_queue(QueueType::Graphics).get_command_buffer()?;
		cmd.begin_render_pass(&RenderPassDesc {
			color_attachments: &[ColorAttachment {
				clear_color: hue_to_color(hue),
				..ColorAttachment::new(swap_chain.get_backbuffer_texture())
			}],
			depth_stencil_attachment: None,
			render_area: None,
		});
		cmd.end_render_pass();
		cmd.submit()?;

		if running.swap_chain.present()? == PresentResult::OutOfDate {
			info!("Swap chain out of date, recreating");
		}
		self.frames += 1;
		Ok(self.args.frames.map_or(true, |max| self.frames < max))
	}

	fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
		error!("{err:?}");
		self.error = Some(err);
		event_loop.exit();
	}
}

fn hue_to_color(hue: f32) -> Color {
	let channel = |offset: f32| {
		let x = ((hue + offset) % 1. * 6. - 3.).abs() - 1.;
		x.clamp(0., 1.)
	};
	Color::new(channel(0.), channel(2. / 3.), channel(1. / 3.), 1.)
}

impl ApplicationHandler for ClearScreen {
	fn resumed(&mut self, event_loop: &ActiveEventLoop) {
		if self.running.is_none() {
			match self.init(event_loop) {
				Ok(running) => self.running = Some(running),
				Err(err) => self.fail(event_loop, err),
			}
		}
	}

	fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
		if let Some(running) = self.running.as_mut() {
			running.swap_chain.handle_window_event(&event);
		}
		match event {
			WindowEvent::CloseRequested => event_loop.exit(),
			WindowEvent::RedrawRequested => match self.render() {
				Ok(true) => {}
				Ok(false) => event_loop.exit(),
				Err(err) => self.fail(event_loop, err),
			},
			_ => {}
		}
	}

	fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
		if let Some(running) = self.running.as_ref() {
			running.swap_chain.window().request_redraw();
		}
	}

	fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
		if let Some(running) = self.running.take() {
			info!("Presented {} frames in {:?}", self.frames, self.start.elapsed());
			drop(running);
		}
	}
}

fn main() -> anyhow::Result<()> {
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
	let args = Args::parse();
	let mut app = ClearScreen {
		args,
		running: None,
		start: Instant::now(),
		frames: 0,
		error: None,
	};
	EventLoop::new()?.run_app(&mut app)?;
	match app.error {
		Some(err) => Err(err),
		None => Ok(()),
	}
}

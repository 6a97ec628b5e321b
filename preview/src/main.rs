//! Desktop preview app for shift-register-pwm
//!
//! Simulates a chain of shift registers in a window. The refresh cycle is
//! driven through the soft timer and the dispatch trampoline exactly like on
//! a device; the window shows the duty cycle each output actually produced.

use std::time::Instant as StdInstant;

use eframe::egui::{self};
use shift_register_pwm::{
    BitPlane, DEFAULT_TICK_INTERVAL, Instant, PINS_PER_REGISTER, RefreshCycle,
    ShiftPwm, ShiftRegisterChain, SoftTimer,
};

/// Number of registers in the simulated chain
const REGISTERS: u8 = 4;

/// Byte capacity of each plane
const PLANE_CAPACITY: usize = 255 * REGISTERS as usize;

/// Resolution of the fine plane
const FINE_RESOLUTION: u8 = 255;

/// Resolution of the coarse plane
const COARSE_RESOLUTION: u8 = 8;

/// Upper bound of simulated ticks per rendered frame
const MAX_TICKS_PER_FRAME: u64 = 50_000;

/// Size of each LED rectangle in pixels
const LED_SIZE: f32 = 28.0;

/// Gap between LEDs
const LED_GAP: f32 = 6.0;

type Plane = BitPlane<PLANE_CAPACITY>;

/// Simulated chain of latching shift registers
///
/// Every emitted byte enters the first register and pushes the others down
/// the chain. On commit the shifted bytes become the outputs, and the on
/// time of every output is accumulated.
struct SimulatedChain {
    shifted: Vec<u8>,
    on_latches: Vec<u32>,
    latches: u32,
}

impl SimulatedChain {
    fn new(registers: u8) -> Self {
        Self {
            shifted: vec![0; usize::from(registers)],
            on_latches: vec![0; usize::from(registers) * usize::from(PINS_PER_REGISTER)],
            latches: 0,
        }
    }

    /// Measured duty of every output since the last call (0.0-1.0)
    fn take_duties(&mut self) -> Vec<f32> {
        let latches = self.latches.max(1);
        #[allow(clippy::cast_precision_loss)]
        let duties = self
            .on_latches
            .iter()
            .map(|&on| on as f32 / latches as f32)
            .collect();
        self.on_latches.fill(0);
        self.latches = 0;
        duties
    }
}

impl ShiftRegisterChain for SimulatedChain {
    #[allow(clippy::cast_possible_truncation)]
    fn register_count(&self) -> u8 {
        self.shifted.len() as u8
    }

    fn emit(&mut self, byte: u8) {
        self.shifted.rotate_right(1);
        if let Some(first) = self.shifted.first_mut() {
            *first = byte;
        }
    }

    fn commit(&mut self) {
        self.latches += 1;
        for (register, byte) in self.shifted.iter().enumerate() {
            for bit in 0..PINS_PER_REGISTER {
                if byte & (1 << bit) != 0 {
                    self.on_latches[register * usize::from(PINS_PER_REGISTER) + usize::from(bit)] +=
                        1;
                }
            }
        }
    }
}

fn main() -> eframe::Result<()> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([900.0, 600.0])
            .with_title("Shift Register PWM Preview"),
        ..Default::default()
    };

    eframe::run_native(
        "shift-register-pwm-preview",
        options,
        Box::new(|_cc| Ok(Box::new(PreviewApp::new()))),
    )
}

fn leak_plane(resolution: u8) -> &'static Plane {
    match Plane::new(resolution, REGISTERS) {
        Ok(plane) => Box::leak(Box::new(plane)),
        Err(err) => panic!("plane does not fit: {err:?}"),
    }
}

struct PreviewApp {
    /// The writer handle of the simulated refresh cycle
    pwm: ShiftPwm<SimulatedChain, PLANE_CAPACITY>,
    /// Plane that is not currently emitted
    spare: &'static Plane,
    /// Software timer driving the refresh cycle
    timer: SoftTimer<1>,

    // UI state
    /// Requested duty per pin
    duties: Vec<u8>,
    /// Measured duty per pin, from the last frame
    measured: Vec<f32>,
    /// Simulated time in microseconds
    t_us: u64,
    /// Wall-clock reference for delta time
    last_frame: StdInstant,
    /// Whether the simulation is running
    playing: bool,
    /// Time scale multiplier (1.0 = realtime)
    time_scale: f32,
    /// Value applied by "Set all"
    all_value: u8,
}

impl PreviewApp {
    fn new() -> Self {
        let front = leak_plane(FINE_RESOLUTION);
        let spare = leak_plane(COARSE_RESOLUTION);
        let chain = SimulatedChain::new(REGISTERS);
        let refresh: &'static RefreshCycle<_, PLANE_CAPACITY> = match RefreshCycle::new(chain, front) {
            Ok(refresh) => Box::leak(Box::new(refresh)),
            Err(err) => panic!("chain does not match plane: {err:?}"),
        };
        let Some(pwm) = refresh.handle() else {
            unreachable!("fresh refresh cycle has its handle");
        };

        let mut timer = SoftTimer::new();
        if let Err(err) = pwm.start(&mut timer, DEFAULT_TICK_INTERVAL) {
            panic!("cannot start refresh: {err:?}");
        }

        let pins = usize::from(REGISTERS) * usize::from(PINS_PER_REGISTER);
        let mut app = Self {
            pwm,
            spare,
            timer,
            duties: vec![0; pins],
            measured: vec![0.0; pins],
            t_us: 0,
            last_frame: StdInstant::now(),
            playing: true,
            time_scale: 1.0,
            all_value: 128,
        };
        app.ramp();
        app
    }

    /// Fill the pins with a brightness ramp
    #[allow(clippy::cast_possible_truncation)]
    fn ramp(&mut self) {
        let last = self.duties.len().saturating_sub(1).max(1);
        for (pin, duty) in self.duties.iter_mut().enumerate() {
            *duty = (pin * 255 / last) as u8;
        }
        self.apply_duties();
    }

    /// Write every requested duty to the active plane
    #[allow(clippy::cast_possible_truncation)]
    fn apply_duties(&self) {
        for (pin, &duty) in self.duties.iter().enumerate() {
            self.pwm.set(pin as u16, duty);
        }
    }

    /// Swap the fine and coarse planes
    fn swap_planes(&mut self) {
        // Prepare the spare plane before it goes live
        let spare = self.spare;
        for (pin, &duty) in self.duties.iter().enumerate() {
            #[allow(clippy::cast_possible_truncation)]
            let pin = pin as u16;
            spare.set(pin, duty);
        }
        match self.pwm.swap(spare) {
            Ok(previous) => self.spare = previous,
            Err(_) => unreachable!("planes share the chain width"),
        }
    }

    /// Advance the simulation to match the wall clock
    fn update_time(&mut self) {
        let now = StdInstant::now();
        let delta = now.duration_since(self.last_frame);
        self.last_frame = now;

        if !self.playing {
            return;
        }

        let delta_us = delta.as_secs_f64() * 1_000_000.0 * f64::from(self.time_scale);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let delta_us = if delta_us.is_finite() {
            delta_us.max(0.0) as u64
        } else {
            0
        };
        let interval = DEFAULT_TICK_INTERVAL.as_micros();
        let end = self.t_us + delta_us.min(MAX_TICKS_PER_FRAME * interval);
        while self.t_us < end {
            self.t_us += interval;
            self.timer.run(Instant::from_micros(self.t_us));
        }

        self.measured = self.pwm.refresh().with_chain(SimulatedChain::take_duties);
    }
}

impl eframe::App for PreviewApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.update_time();

        // Request continuous repaint for animation
        ctx.request_repaint();

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.horizontal(|ui| {
                // <PlaybackControls>
                ui.vertical(|ui| {
                    ui.horizontal(|ui| {
                        if ui
                            .button(if self.playing {
                                "⏸ Pause"
                            } else {
                                "▶ Play"
                            })
                            .clicked()
                        {
                            self.playing = !self.playing;
                        }
                    });

                    ui.add_space(4.0);

                    let secs = self.t_us / 1_000_000;
                    let ms = self.t_us / 1000 % 1000;
                    ui.label(format!("Simulated: {secs}.{ms:03}s"));
                    ui.label(format!("Tick: {} us", DEFAULT_TICK_INTERVAL.as_micros()));

                    ui.add_space(4.0);

                    ui.horizontal(|ui| {
                        ui.label("Speed:");
                        ui.add(
                            egui::Slider::new(&mut self.time_scale, 0.001..=1.0)
                                .logarithmic(true),
                        );
                    });
                });
                // </PlaybackControls>
                ui.add_space(16.0);
                // <PlaneControls>
                ui.vertical(|ui| {
                    let plane = self.pwm.plane();
                    ui.label(format!(
                        "Plane: {} slices x {} registers, cursor {}",
                        plane.resolution(),
                        plane.registers(),
                        self.pwm.refresh().cursor()
                    ));

                    ui.add_space(4.0);

                    ui.horizontal(|ui| {
                        if ui.button("Swap plane").clicked() {
                            self.swap_planes();
                        }
                        if ui.button("Ramp").clicked() {
                            self.ramp();
                        }
                        if ui.button("Clear").clicked() {
                            self.duties.fill(0);
                            self.pwm.clear();
                        }
                    });

                    ui.add_space(4.0);

                    ui.horizontal(|ui| {
                        ui.label("All:");
                        ui.add(egui::DragValue::new(&mut self.all_value).range(0u8..=255u8));
                        if ui.button("Set all").clicked() {
                            self.duties.fill(self.all_value);
                            self.pwm.set_all(self.all_value);
                        }
                    });
                });
                // </PlaneControls>
            });

            ui.add_space(16.0);

            // === Outputs ===
            let led_pitch = LED_SIZE + LED_GAP;
            let columns = usize::from(PINS_PER_REGISTER);
            #[allow(clippy::cast_precision_loss)]
            let height = f32::from(REGISTERS) * led_pitch;
            #[allow(clippy::cast_precision_loss)]
            let width = columns as f32 * led_pitch;

            let (response, painter) =
                ui.allocate_painter(egui::vec2(width, height), egui::Sense::hover());
            let origin = response.rect.min;

            #[allow(
                clippy::cast_precision_loss,
                clippy::cast_possible_truncation,
                clippy::cast_sign_loss
            )]
            for (pin, duty) in self.measured.iter().enumerate() {
                let row = pin / columns;
                let col = pin % columns;
                let x = origin.x + col as f32 * led_pitch;
                let y = origin.y + row as f32 * led_pitch;

                let rect = egui::Rect::from_min_size(
                    egui::pos2(x, y),
                    egui::vec2(LED_SIZE, LED_SIZE),
                );
                let level = (duty.clamp(0.0, 1.0) * 255.0) as u8;
                let color = egui::Color32::from_rgb(level, level / 2, 0);
                painter.rect_filled(rect, 3.0, color);
            }

            ui.add_space(16.0);

            egui::ScrollArea::vertical().show(ui, |ui| {
                let mut changed = None;
                for (pin, duty) in self.duties.iter_mut().enumerate() {
                    let register = pin / columns;
                    let bit = pin % columns;
                    ui.horizontal(|ui| {
                        ui.label(format!("SR{register} Q{bit}"));
                        if ui.add(egui::Slider::new(duty, 0u8..=255u8)).changed() {
                            changed = Some((pin, *duty));
                        }
                        let measured = self.measured.get(pin).copied().unwrap_or_default();
                        ui.label(format!("{:5.1}%", measured * 100.0));
                    });
                }
                if let Some((pin, duty)) = changed {
                    #[allow(clippy::cast_possible_truncation)]
                    let pin = pin as u16;
                    self.pwm.set(pin, duty);
                }
            });
        });
    }
}

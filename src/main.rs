//! Cube Runner entry point
//!
//! On the web this wires the DOM to the game and drives the frame loop from
//! `requestAnimationFrame`. Natively it plays one headless autopilot run.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
mod wasm_game {
    use std::cell::RefCell;
    use std::rc::Rc;
    use wasm_bindgen::prelude::*;
    use wasm_bindgen_futures::JsFuture;
    use web_sys::{
        Document, HtmlCanvasElement, HtmlInputElement, HtmlSelectElement, KeyboardEvent,
        PointerEvent, WheelEvent,
    };

    use cube_runner::audio::AudioManager;
    use cube_runner::driver::{FrameDriver, FrameOutcome, NotificationPhase};
    use cube_runner::error::GameError;
    use cube_runner::game::{Command, Game};
    use cube_runner::renderer::RenderState;
    use cube_runner::settings::Settings;
    use cube_runner::sim::{LevelCatalog, PlayState};
    use cube_runner::tuning::Tuning;
    use cube_runner::world::{ObjectShape, TextureKind, TextureRequest};

    /// Everything the page callbacks share
    struct App {
        game: Game,
        render: RenderState,
        driver: FrameDriver,
        canvas: HtmlCanvasElement,
        /// Pending animation frame, cancelled on pagehide
        frame_id: Option<i32>,
        /// Last pointer position while dragging the idle camera
        drag: Option<(i32, i32)>,
        stopped: bool,
    }

    impl App {
        fn dispatch(&mut self, command: Command) {
            let now = now_ms();
            if let Err(e) = self.game.handle(command, now, &mut self.render) {
                self.driver.report(&e, now);
            }
        }

        fn resize(&mut self) {
            let (width, height) = canvas_size(&self.canvas);
            self.canvas.set_width(width);
            self.canvas.set_height(height);
            self.render.resize(width, height);
            self.game.resize(width, height);
            log::debug!("Resized to {}x{}", width, height);
        }

        /// Cancel the pending frame and release every GPU resource
        fn shutdown(&mut self) {
            if self.stopped {
                return;
            }
            self.stopped = true;
            if let (Some(window), Some(id)) = (web_sys::window(), self.frame_id.take()) {
                let _ = window.cancel_animation_frame(id);
            }
            self.game.dispose(&mut self.render);
            self.render.dispose();
            log::info!("Cube Runner stopped");
        }
    }

    /// Clock shared by frames and commands (ms, same origin as rAF timestamps)
    fn now_ms() -> f64 {
        web_sys::window()
            .and_then(|w| w.performance())
            .map(|p| p.now())
            .unwrap_or(0.0)
    }

    fn canvas_size(canvas: &HtmlCanvasElement) -> (u32, u32) {
        let dpr = web_sys::window().map_or(1.0, |w| w.device_pixel_ratio());
        let width = (canvas.client_width() as f64 * dpr) as u32;
        let height = (canvas.client_height() as f64 * dpr) as u32;
        (width.max(1), height.max(1))
    }

    fn set_text(document: &Document, id: &str, text: &str) {
        if let Some(el) = document.get_element_by_id(id) {
            el.set_text_content(Some(text));
        }
    }

    fn set_visible(document: &Document, id: &str, visible: bool) {
        if let Some(el) = document.get_element_by_id(id) {
            let _ = el.set_attribute("class", if visible { "" } else { "hidden" });
        }
    }

    /// Show an error that stops the page before the loop exists
    fn show_fatal(document: &Document, error: &GameError) {
        log::error!("{}", error);
        set_text(document, "notification-message", &error.to_string());
        set_visible(document, "notification", true);
        set_visible(document, "reload-btn", true);
        set_visible(document, "loading", false);
    }

    pub async fn run() {
        console_error_panic_hook::set_once();
        console_log::init_with_level(log::Level::Info).expect("Failed to init logger");

        log::info!("Cube Runner starting...");

        let window = web_sys::window().expect("no window");
        let document = window.document().expect("no document");

        let canvas: HtmlCanvasElement = document
            .get_element_by_id("canvas")
            .expect("no canvas")
            .dyn_into()
            .expect("not a canvas");

        let (width, height) = canvas_size(&canvas);
        canvas.set_width(width);
        canvas.set_height(height);

        let render = match init_renderer(&canvas, width, height).await {
            Ok(render) => render,
            Err(e) => {
                show_fatal(&document, &e);
                return;
            }
        };

        let settings = Settings::load();
        let seed = js_sys::Date::now() as u64;
        let mut game = Game::new(
            Tuning::default(),
            LevelCatalog::standard(),
            settings.clone(),
            seed,
            Box::new(AudioManager::new()),
        );
        game.resize(width, height);

        let mut app = App {
            game,
            render,
            driver: FrameDriver::new(),
            canvas: canvas.clone(),
            frame_id: None,
            drag: None,
            stopped: false,
        };
        if let Err(e) = app.game.init(&mut app.render) {
            app.render.dispose();
            show_fatal(&document, &e);
            return;
        }
        log::info!("Game initialized with seed: {}", seed);

        if let Some(select) = document
            .get_element_by_id("object-select")
            .and_then(|el| el.dyn_into::<HtmlSelectElement>().ok())
        {
            select.set_value(settings.object_type.as_str());
        }
        set_visible(&document, "loading", false);

        let app = Rc::new(RefCell::new(app));
        setup_input_handlers(&canvas, app.clone());
        setup_controls(&document, app.clone());
        setup_lifecycle(app.clone());

        request_animation_frame(app);
        log::info!("Cube Runner running!");
    }

    async fn init_renderer(
        canvas: &HtmlCanvasElement,
        width: u32,
        height: u32,
    ) -> Result<RenderState, GameError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::BROWSER_WEBGPU | wgpu::Backends::GL,
            ..Default::default()
        });

        let surface = instance
            .create_surface(wgpu::SurfaceTarget::Canvas(canvas.clone()))
            .map_err(|e| GameError::Initialization(format!("surface: {}", e)))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| GameError::Initialization(format!("adapter: {}", e)))?;

        log::info!("Using adapter: {:?}", adapter.get_info().name);
        RenderState::new(surface, &adapter, width, height).await
    }

    fn setup_input_handlers(canvas: &HtmlCanvasElement, app: Rc<RefCell<App>>) {
        let window = web_sys::window().unwrap();

        // Keyboard
        {
            let app = app.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: KeyboardEvent| {
                if app.borrow_mut().game.on_key_down(&event.key()) {
                    event.prevent_default();
                }
            });
            let _ = window
                .add_event_listener_with_callback("keydown", closure.as_ref().unchecked_ref());
            closure.forget();
        }
        {
            let app = app.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: KeyboardEvent| {
                app.borrow_mut().game.on_key_up(&event.key());
            });
            let _ =
                window.add_event_listener_with_callback("keyup", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        // Pointer drag orbits the idle camera
        {
            let app = app.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: PointerEvent| {
                app.borrow_mut().drag = Some((event.client_x(), event.client_y()));
            });
            let _ = canvas
                .add_event_listener_with_callback("pointerdown", closure.as_ref().unchecked_ref());
            closure.forget();
        }
        {
            let app = app.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: PointerEvent| {
                let mut a = app.borrow_mut();
                if let Some((x, y)) = a.drag {
                    let (nx, ny) = (event.client_x(), event.client_y());
                    a.game.pointer_drag((nx - x) as f32, (ny - y) as f32);
                    a.drag = Some((nx, ny));
                }
            });
            let _ = canvas
                .add_event_listener_with_callback("pointermove", closure.as_ref().unchecked_ref());
            closure.forget();
        }
        for name in ["pointerup", "pointerleave", "pointercancel"] {
            let app = app.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: PointerEvent| {
                app.borrow_mut().drag = None;
            });
            let _ = canvas.add_event_listener_with_callback(name, closure.as_ref().unchecked_ref());
            closure.forget();
        }

        // Wheel zoom
        {
            let closure = Closure::<dyn FnMut(_)>::new(move |event: WheelEvent| {
                event.prevent_default();
                app.borrow_mut().game.wheel(event.delta_y() as f32);
            });
            let _ =
                canvas.add_event_listener_with_callback("wheel", closure.as_ref().unchecked_ref());
            closure.forget();
        }
    }

    fn on_click(document: &Document, id: &str, app: Rc<RefCell<App>>, handler: fn(&mut App)) {
        if let Some(btn) = document.get_element_by_id(id) {
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::MouseEvent| {
                handler(&mut app.borrow_mut());
            });
            let _ = btn.add_event_listener_with_callback("click", closure.as_ref().unchecked_ref());
            closure.forget();
        }
    }

    fn setup_controls(document: &Document, app: Rc<RefCell<App>>) {
        on_click(document, "start-btn", app.clone(), |a| {
            a.dispatch(Command::StartGame)
        });
        on_click(document, "restart-btn", app.clone(), |a| {
            a.dispatch(Command::RestartGame)
        });
        on_click(document, "randomize-color-btn", app.clone(), |a| {
            a.dispatch(Command::RandomizeColor)
        });
        on_click(document, "notification-close", app.clone(), |a| {
            a.driver.dismiss_notification(now_ms())
        });
        on_click(document, "reload-btn", app.clone(), |_| {
            if let Some(window) = web_sys::window() {
                let _ = window.location().reload();
            }
        });

        // Shape select
        if let Some(select) = document
            .get_element_by_id("object-select")
            .and_then(|el| el.dyn_into::<HtmlSelectElement>().ok())
        {
            let app = app.clone();
            let target = select.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| {
                match ObjectShape::parse(&target.value()) {
                    Some(shape) => app.borrow_mut().dispatch(Command::SetShape(shape)),
                    None => log::warn!("Unknown shape '{}'", target.value()),
                }
            });
            let _ =
                select.add_event_listener_with_callback("change", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        // Texture select; "custom" reads the URL field
        if let Some(select) = document
            .get_element_by_id("texture-select")
            .and_then(|el| el.dyn_into::<HtmlSelectElement>().ok())
        {
            let target = select.clone();
            let url_input = document
                .get_element_by_id("texture-url")
                .and_then(|el| el.dyn_into::<HtmlInputElement>().ok());
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| {
                let Some(kind) = TextureKind::parse(&target.value()) else {
                    log::warn!("Unknown texture '{}'", target.value());
                    return;
                };
                let url = url_input
                    .as_ref()
                    .map(|input| input.value())
                    .filter(|url| !url.trim().is_empty());
                app.borrow_mut().dispatch(Command::SetTexture(kind, url));
            });
            let _ =
                select.add_event_listener_with_callback("change", closure.as_ref().unchecked_ref());
            closure.forget();
        }
    }

    fn setup_lifecycle(app: Rc<RefCell<App>>) {
        let window = web_sys::window().unwrap();
        let document = window.document().unwrap();

        {
            let app = app.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| {
                app.borrow_mut().resize();
            });
            let _ =
                window.add_event_listener_with_callback("resize", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        // Tab hidden: drop held keys and restart the frame clock on return
        {
            let app = app.clone();
            let document_clone = document.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| {
                if document_clone.visibility_state() == web_sys::VisibilityState::Hidden {
                    let mut a = app.borrow_mut();
                    a.game.on_key_up("ArrowLeft");
                    a.game.on_key_up("ArrowRight");
                    a.driver.suspend();
                    log::info!("Page hidden");
                }
            });
            let _ = document.add_event_listener_with_callback(
                "visibilitychange",
                closure.as_ref().unchecked_ref(),
            );
            closure.forget();
        }

        {
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| {
                app.borrow_mut().shutdown();
            });
            let _ = window
                .add_event_listener_with_callback("pagehide", closure.as_ref().unchecked_ref());
            closure.forget();
        }
    }

    fn request_animation_frame(app: Rc<RefCell<App>>) {
        let window = web_sys::window().unwrap();
        let handle = app.clone();
        let closure = Closure::once(move |time: f64| {
            game_loop(handle, time);
        });
        match window.request_animation_frame(closure.as_ref().unchecked_ref()) {
            Ok(id) => app.borrow_mut().frame_id = Some(id),
            Err(e) => log::error!("requestAnimationFrame failed: {:?}", e),
        }
        closure.forget();
    }

    fn game_loop(app: Rc<RefCell<App>>, time: f64) {
        let request = {
            let mut a = app.borrow_mut();
            if a.stopped {
                return;
            }
            a.frame_id = None;

            let App {
                game,
                render,
                driver,
                ..
            } = &mut *a;
            if let FrameOutcome::Halted(e) = driver.frame(time, game, render) {
                log::debug!("Loop halted: {}", e);
            }
            update_hud(&a, time);
            a.game.take_texture_request()
        };

        if let Some(request) = request {
            load_texture(app.clone(), request);
        }
        request_animation_frame(app);
    }

    /// Fetch a custom avatar texture and hand it back to the game
    fn load_texture(app: Rc<RefCell<App>>, request: TextureRequest) {
        log::info!("Loading custom texture {}", request.url);
        wasm_bindgen_futures::spawn_local(async move {
            let bytes = fetch_bytes(&request.url).await;
            let mut a = app.borrow_mut();
            if a.stopped {
                return;
            }
            let App {
                game,
                render,
                driver,
                ..
            } = &mut *a;
            match game.apply_custom_texture(request.generation, bytes, render) {
                Ok(true) => log::info!("Custom texture applied"),
                Ok(false) => log::debug!("Custom texture arrived for a replaced world"),
                Err(e) => driver.report(&e, now_ms()),
            }
        });
    }

    async fn fetch_bytes(url: &str) -> Result<Vec<u8>, GameError> {
        let load_err =
            |what: &str, e: JsValue| GameError::TextureLoad(format!("{}: {:?}", what, e));
        let window =
            web_sys::window().ok_or_else(|| GameError::TextureLoad("no window".into()))?;
        let response: web_sys::Response = JsFuture::from(window.fetch_with_str(url))
            .await
            .map_err(|e| load_err("fetch", e))?
            .dyn_into()
            .map_err(|e| load_err("response", e))?;
        if !response.ok() {
            return Err(GameError::TextureLoad(format!(
                "{} returned {}",
                url,
                response.status()
            )));
        }
        let buffer = JsFuture::from(response.array_buffer().map_err(|e| load_err("body", e))?)
            .await
            .map_err(|e| load_err("body", e))?;
        Ok(js_sys::Uint8Array::new(&buffer).to_vec())
    }

    /// Update HUD elements in DOM
    fn update_hud(app: &App, time: f64) {
        let Some(document) = web_sys::window().and_then(|w| w.document()) else {
            return;
        };
        let snapshot = app.game.snapshot();

        set_text(&document, "score", &snapshot.score.to_string());
        set_text(&document, "high-score", &snapshot.high_score.to_string());
        set_text(&document, "level", &snapshot.level.to_string());

        let label = match snapshot.start_label_level() {
            Some(level) => format!("Start Level {}", level),
            None => "Start".to_string(),
        };
        set_text(&document, "start-btn", &label);
        let idle = snapshot.play_state == PlayState::Idle;
        set_visible(&document, "start-btn", idle);
        set_visible(&document, "restart-btn", snapshot.play_state.is_terminal());

        let status = match snapshot.play_state {
            PlayState::Won => "You Win!",
            PlayState::Lost => "Game Over",
            _ => "",
        };
        set_text(&document, "status", status);

        match app.driver.notification() {
            Some(notification) => {
                let class = match notification.phase(time) {
                    NotificationPhase::Visible => "notification",
                    NotificationPhase::Closing => "notification closing",
                    NotificationPhase::Gone => "hidden",
                };
                if let Some(el) = document.get_element_by_id("notification") {
                    let _ = el.set_attribute("class", class);
                }
                set_text(&document, "notification-message", &notification.message);
                set_visible(&document, "reload-btn", notification.fatal);
            }
            None => set_visible(&document, "notification", false),
        }
    }
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub async fn wasm_main() {
    wasm_game::run().await;
}

#[cfg(not(target_arch = "wasm32"))]
mod headless {
    use cube_runner::driver::{FrameDriver, FrameOutcome};
    use cube_runner::error::GameError;
    use cube_runner::game::{Game, SilentAudio};
    use cube_runner::settings::Settings;
    use cube_runner::sim::{LevelCatalog, PlayState};
    use cube_runner::tuning::Tuning;
    use cube_runner::world::HeadlessGpu;

    const FRAME_MS: f64 = 1000.0 / 60.0;
    /// Two minutes of simulated play
    const MAX_FRAMES: usize = 60 * 120;
    /// How far ahead the autopilot looks for trees
    const LOOK_AHEAD: f32 = 6.0;
    /// Lateral gap the autopilot keeps to a tree's center
    const CLEARANCE: f32 = 1.4;

    /// Hold the key away from the nearest tree ahead that is too close laterally
    fn steer(game: &mut Game, held: &mut Option<&'static str>) {
        let p = game.avatar_position();
        let wanted = game.world().and_then(|world| {
            world
                .obstacles
                .iter()
                .filter(|o| o.position.z < p.z && o.position.z > p.z - LOOK_AHEAD)
                .filter(|o| (o.position.x - p.x).abs() < CLEARANCE)
                .max_by(|a, b| a.position.z.total_cmp(&b.position.z))
                .map(|o| {
                    let go_left = if o.position.x == p.x {
                        p.x > 0.0
                    } else {
                        o.position.x > p.x
                    };
                    if go_left { "ArrowLeft" } else { "ArrowRight" }
                })
        });
        if *held != wanted {
            if let Some(key) = held.take() {
                game.on_key_up(key);
            }
            if let Some(key) = wanted {
                game.on_key_down(key);
            }
            *held = wanted;
        }
    }

    pub fn run(tuning: Tuning) -> Result<(), GameError> {
        let mut gpu = HeadlessGpu::new();
        let mut game = Game::new(
            tuning,
            LevelCatalog::standard(),
            Settings::load(),
            7,
            Box::new(SilentAudio),
        );
        game.init(&mut gpu)?;
        let mut driver = FrameDriver::new();
        let mut held = None;
        let mut now = 0.0;

        for _ in 0..MAX_FRAMES {
            now += FRAME_MS;
            match game.snapshot().play_state {
                PlayState::Idle => {
                    held = None;
                    game.start(now, &mut gpu)?;
                }
                PlayState::Playing => steer(&mut game, &mut held),
                PlayState::Won if game.session().victory_active() => {}
                PlayState::Won | PlayState::Lost => break,
            }
            match driver.frame(now, &mut game, &mut gpu) {
                FrameOutcome::Halted(e) => return Err(e),
                FrameOutcome::Degraded(errors) => {
                    log::warn!("{} recoverable errors this frame", errors.len())
                }
                FrameOutcome::Rendered | FrameOutcome::Skipped => {}
            }
        }

        let snapshot = game.snapshot();
        log::info!(
            "Run finished: {} on level {}, score {}, high score {}",
            snapshot.play_state.as_str(),
            snapshot.level,
            snapshot.score,
            snapshot.high_score
        );
        game.dispose(&mut gpu);
        if gpu.live_count() > 0 {
            log::warn!("{} GPU resources leaked", gpu.live_count());
        }
        Ok(())
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    use cube_runner::error::GameError;
    use cube_runner::tuning::Tuning;

    env_logger::init();
    log::info!("Cube Runner (native) starting...");
    log::info!("Headless autopilot run; use `trunk serve` to play");

    // Optional tuning override: cube-runner [tuning.json]
    let tuning = match std::env::args().nth(1) {
        Some(path) => match std::fs::read_to_string(&path)
            .map_err(|e| GameError::Initialization(e.to_string()))
            .and_then(|json| Tuning::from_json(&json))
        {
            Ok(tuning) => tuning,
            Err(e) => {
                log::error!("Failed to load tuning from {}: {}", path, e);
                std::process::exit(1);
            }
        },
        None => Tuning::default(),
    };

    if let Err(e) = headless::run(tuning) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is wasm_main, this is just to satisfy the compiler
}

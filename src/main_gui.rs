use std::cell::RefCell;
use std::rc::Rc;
use std::time::Instant;

use fltk::{
    app,
    button::Button,
    dialog,
    enums::{CallbackTrigger, ColorDepth, FrameType},
    frame::Frame,
    group::{Flex, Scroll, ScrollType},
    image::RgbImage,
    prelude::*,
    valuator::HorNiceSlider,
    window::Window,
};
use log::{error, info};

use specview::playback::{MiniaudioEngine, TransportState};
use specview::{format_time, Session, Settings, ViewerError, SLIDER_MAX};

type SharedSession = Rc<RefCell<Session<MiniaudioEngine>>>;

// ─── Widgets ───────────────────────────────────────────────────────────────────

#[derive(Clone)]
struct Widgets {
    btn_play: Button,
    lbl_time: Frame,
    slider: HorNiceSlider,
    scroll: Scroll,
    image_frame: Frame,
    status_bar: Frame,
}

impl Widgets {
    fn show_image(&mut self, image: &image::RgbaImage) {
        match RgbImage::new(
            image.as_raw(),
            image.width() as i32,
            image.height() as i32,
            ColorDepth::Rgba8,
        ) {
            Ok(img) => {
                // Size only: the frame's position carries the scroll offset
                self.image_frame.set_size(img.width(), img.height());
                self.image_frame.set_image(Some(img));
            }
            Err(e) => error!("Failed to create display image: {:?}", e),
        }
        self.scroll.redraw();
    }

    fn scroll_to(&mut self, x: u32) {
        let y = self.scroll.yposition();
        self.scroll.scroll_to(x as i32, y);
    }

    fn viewport_width(&self) -> u32 {
        self.scroll.w().max(1) as u32
    }

    fn set_transport_label(&mut self, state: TransportState) {
        let label = if state == TransportState::Playing { "@||" } else { "@>" };
        self.btn_play.set_label(label);
    }

    fn reset_position(&mut self, total: f64) {
        self.slider.set_value(0.0);
        self.lbl_time
            .set_label(&format!("{} / {}", format_time(0.0), format_time(total)));
    }
}

/// Redraw the marker frame for the current position, e.g. after a seek or
/// zoom while paused.
fn refresh_frame(session: &SharedSession, w: &mut Widgets) {
    let frame = session.borrow_mut().current_frame(w.viewport_width());
    if let Some(frame) = frame {
        w.show_image(&frame.image);
        w.scroll_to(frame.scroll_x);
        w.slider.set_value(frame.slider_value as f64);
        w.lbl_time.set_label(&frame.time_label);
    }
}

fn report(w: &mut Widgets, e: &ViewerError) {
    error!("{}", e);
    w.status_bar.set_label(&e.to_string());
    if !matches!(e, ViewerError::NoFileLoaded) {
        dialog::alert_default(&e.to_string());
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = Settings::load_or_default(Settings::FILE_NAME);
    let tick_seconds = settings.playback.tick_interval_ms.max(1) as f64 / 1000.0;
    let session: SharedSession = Rc::new(RefCell::new(Session::new(
        settings,
        MiniaudioEngine::new(),
    )));

    let app = app::App::default();
    let mut win = Window::default()
        .with_size(1200, 760)
        .with_label("Spectrogram Viewer");

    let mut root = Flex::default_fill().column();
    root.set_margin(6);
    root.set_pad(6);

    let mut toolbar = Flex::default().row();
    let mut btn_open = Button::default().with_label("Load Audio");
    let mut btn_save = Button::default().with_label("Save Spectrogram");
    let btn_play = Button::default().with_label("@>");
    let mut btn_stop = Button::default().with_label("@square");
    let mut btn_zoom_in = Button::default().with_label("Zoom +");
    let mut btn_zoom_out = Button::default().with_label("Zoom -");
    let mut lbl_time = Frame::default().with_label("00:00 / 00:00");
    lbl_time.set_frame(FrameType::FlatBox);
    toolbar.fixed(&btn_play, 50);
    toolbar.fixed(&btn_stop, 50);
    toolbar.end();
    root.fixed(&toolbar, 32);

    let mut slider = HorNiceSlider::default();
    slider.set_range(0.0, SLIDER_MAX as f64);
    slider.set_step(1.0, 1);
    slider.set_value(0.0);
    slider.set_trigger(CallbackTrigger::Release);
    root.fixed(&slider, 24);

    let mut scroll = Scroll::default();
    scroll.set_type(ScrollType::BothAlways);
    let image_frame = Frame::default().with_size(1, 1);
    scroll.end();

    let mut status_bar = Frame::default().with_label("Load an audio file to begin");
    status_bar.set_frame(FrameType::FlatBox);
    root.fixed(&status_bar, 22);

    root.end();
    win.end();
    win.make_resizable(true);

    let widgets = Widgets {
        btn_play: btn_play.clone(),
        lbl_time,
        slider: slider.clone(),
        scroll,
        image_frame,
        status_bar,
    };

    // ─── Load ───
    {
        let session = session.clone();
        let mut w = widgets.clone();
        btn_open.set_callback(move |_| {
            let mut chooser =
                dialog::NativeFileChooser::new(dialog::NativeFileChooserType::BrowseFile);
            chooser.set_filter("Audio\t*.{wav,mp3,flac,ogg}");
            chooser.show();

            let filename = chooser.filename();
            if filename.as_os_str().is_empty() {
                return;
            }

            w.status_bar.set_label("Generating spectrogram...");
            app::flush();

            let result = session.borrow_mut().load(&filename);
            if let Err(e) = &result {
                // The previous track (if any) is still loaded and keeps its position
                report(&mut w, e);
                refresh_frame(&session, &mut w);
                let state = session.borrow().state();
                w.set_transport_label(state);
                return;
            }

            let mut s = session.borrow_mut();
            let total = s.total_duration();
            let image = s.display_image().cloned();
            drop(s);
            if let Some(image) = image {
                w.show_image(&image);
                w.scroll_to(0);
                w.reset_position(total);
                w.set_transport_label(TransportState::Stopped);
                w.status_bar.set_label(&format!(
                    "{} | {}",
                    filename.file_name().unwrap_or_default().to_string_lossy(),
                    format_time(total)
                ));
            }
        });
    }

    // ─── Save ───
    {
        let session = session.clone();
        let mut w = widgets.clone();
        btn_save.set_callback(move |_| {
            let result = session.borrow().save_spectrogram();
            match result {
                Ok(saved) => {
                    let msg = format!(
                        "Saved {} ({:.2} MB)",
                        saved.path.display(),
                        saved.bytes as f64 / (1024.0 * 1024.0)
                    );
                    w.status_bar.set_label(&msg);
                    dialog::message_default(&msg);
                }
                Err(e) => report(&mut w, &e),
            }
        });
    }

    // ─── Transport ───
    {
        let session = session.clone();
        let mut w = widgets.clone();
        let mut btn_play = btn_play.clone();
        btn_play.set_callback(move |_| {
            let result = session.borrow_mut().toggle_playback(Instant::now());
            match result {
                Ok(state) => w.set_transport_label(state),
                Err(e) => {
                    report(&mut w, &e);
                    w.set_transport_label(TransportState::Stopped);
                }
            }
        });
    }
    {
        let session = session.clone();
        let mut w = widgets.clone();
        btn_stop.set_callback(move |_| {
            let mut s = session.borrow_mut();
            if let Err(e) = s.stop() {
                drop(s);
                report(&mut w, &e);
                return;
            }
            let total = s.total_duration();
            let image = s.display_image().cloned();
            drop(s);
            if let Some(image) = image {
                w.show_image(&image);
            }
            w.scroll_to(0);
            w.reset_position(total);
            w.set_transport_label(TransportState::Stopped);
        });
    }
    {
        let session = session.clone();
        let mut w = widgets.clone();
        slider.set_callback(move |s| {
            let value = s.value().round().max(0.0) as u32;
            let result = session.borrow_mut().seek_slider(value, Instant::now());
            match result {
                Ok(()) => refresh_frame(&session, &mut w),
                Err(e) => {
                    report(&mut w, &e);
                    w.set_transport_label(TransportState::Stopped);
                }
            }
        });
    }

    // ─── Zoom ───
    {
        let session = session.clone();
        let mut w = widgets.clone();
        btn_zoom_in.set_callback(move |_| {
            let changed = session.borrow_mut().zoom_in();
            if changed {
                refresh_frame(&session, &mut w);
            }
        });
    }
    {
        let session = session.clone();
        let mut w = widgets.clone();
        btn_zoom_out.set_callback(move |_| {
            let changed = session.borrow_mut().zoom_out();
            if changed {
                refresh_frame(&session, &mut w);
            }
        });
    }

    // ─── Playback timer ───
    {
        let session = session.clone();
        let mut w = widgets.clone();
        app::add_timeout3(tick_seconds, move |handle| {
            let frame = match session.try_borrow_mut() {
                Ok(mut s) => s.tick(Instant::now(), w.viewport_width()),
                Err(_) => None,
            };
            if let Some(frame) = frame {
                w.show_image(&frame.image);
                w.scroll_to(frame.scroll_x);
                w.slider.set_value(frame.slider_value as f64);
                w.lbl_time.set_label(&frame.time_label);
                if frame.ended {
                    info!("Playback finished");
                    w.scroll_to(0);
                    w.set_transport_label(TransportState::Stopped);
                }
            }
            app::repeat_timeout3(tick_seconds, handle);
        });
    }

    win.show();
    if let Err(e) = app.run() {
        error!("Event loop failed: {}", e);
    }
}

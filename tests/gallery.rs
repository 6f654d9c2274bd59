use std::fs;
use std::path::Path;
use std::time::Duration;

use image::{Rgba, RgbaImage};
use imgshelf::event::AppEvent;
use imgshelf::watch::{FsEvent, FsEventKind};
use imgshelf::{Config, Context};

const IDLE: Duration = Duration::from_millis(150);

fn write_png(path: &Path, shade: u8) {
    RgbaImage::from_pixel(16, 16, Rgba([shade, shade, shade, 255]))
        .save(path)
        .unwrap();
}

fn config(cache: usize, preload: bool) -> Config {
    let mut config = Config::default();
    config.gallery.size = 10;
    config.gallery.cache = cache;
    config.gallery.preload = preload;
    config.list.fsmon = false;
    config.list.loop_mode = false;
    config
}

fn dir_source(dir: &tempfile::TempDir) -> String {
    dir.path().to_str().unwrap().to_string()
}

fn src(dir: &tempfile::TempDir, name: &str) -> String {
    format!("{}/{name}", dir_source(dir))
}

fn has_thumbnail(ctx: &Context, source: &str) -> bool {
    let list = ctx.list().lock();
    list.find(source)
        .and_then(|id| list.get(id))
        .is_some_and(|e| e.has_thumbnail())
}

#[test]
fn visible_thumbnails_load_and_eviction_respects_bound() {
    let dir = tempfile::tempdir().unwrap();
    for i in 0..20 {
        write_png(&dir.path().join(format!("{i:02}.png")), i * 10);
    }

    let mut ctx = Context::init(config(1, true));
    let first = ctx.load(&[dir_source(&dir)]).unwrap();
    ctx.activate(first, 50, 30);
    assert_eq!(ctx.pump(IDLE), None);

    let grid = ctx.gallery().grid();
    assert_eq!(grid.tiles().len(), 8);
    let list = ctx.list().lock();
    for tile in grid.tiles() {
        assert!(list.get(tile.id).unwrap().has_thumbnail());
    }
    let cached = list.iter().filter(|(_, e)| e.has_thumbnail()).count();
    assert!(cached <= 8 + 1, "{cached} thumbnails kept");
    assert!(list.iter().all(|(_, e)| !e.has_frames()));

    // window margin, border of the selected tile, body of the second tile
    let frame = ctx.frame();
    assert_eq!(*frame.get_pixel(0, 0), Rgba([0, 0, 0, 0]));
    assert_eq!(*frame.get_pixel(3, 1), Rgba([0, 0, 0, 255]));
    assert_eq!(frame.get_pixel(19, 6)[3], 255);
}

#[test]
fn filesystem_events_update_the_gallery() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["a.png", "b.png", "c.png"] {
        write_png(&dir.path().join(name), 100);
    }

    let mut ctx = Context::init(config(100, false));
    let first = ctx.load(&[dir_source(&dir)]).unwrap();
    ctx.activate(first, 50, 30);
    ctx.pump(IDLE);
    assert_eq!(ctx.gallery().info(), "[1/3] a.png");

    // new file shows up and gets its thumbnail
    write_png(&dir.path().join("d.png"), 50);
    ctx.events()
        .send(AppEvent::Fs(FsEvent::new(FsEventKind::Create, src(&dir, "d.png"))));
    assert_eq!(ctx.pump(IDLE), None);
    assert_eq!(ctx.list().lock().len(), 4);
    assert!(has_thumbnail(&ctx, &src(&dir, "d.png")));
    assert_eq!(ctx.gallery().info(), "[1/4] a.png");

    // removing the selection moves it to the entry now at the same place
    fs::remove_file(dir.path().join("a.png")).unwrap();
    ctx.events()
        .send(AppEvent::Fs(FsEvent::new(FsEventKind::Remove, src(&dir, "a.png"))));
    ctx.pump(IDLE);
    assert_eq!(ctx.list().lock().len(), 3);
    assert_eq!(ctx.gallery().info(), "[1/3] b.png");

    // a modified selection is reloaded
    write_png(&dir.path().join("b.png"), 200);
    ctx.events()
        .send(AppEvent::Fs(FsEvent::new(FsEventKind::Modify, src(&dir, "b.png"))));
    ctx.pump(IDLE);
    assert!(has_thumbnail(&ctx, &src(&dir, "b.png")));

    // directory events are ignored outside recursive mode
    ctx.events()
        .send(AppEvent::Fs(FsEvent::new(FsEventKind::Create, format!("{}/sub/", dir_source(&dir)))));
    ctx.pump(IDLE);
    assert_eq!(ctx.list().lock().len(), 3);

    for name in ["b.png", "c.png", "d.png"] {
        ctx.events()
            .send(AppEvent::Fs(FsEvent::new(FsEventKind::Remove, src(&dir, name))));
    }
    assert_eq!(ctx.pump(IDLE), Some(0));
    assert!(ctx.list().lock().is_empty());
    assert_eq!(ctx.shutdown(), Some(0));
}

#[test]
fn skip_and_reload() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["a.png", "b.png"] {
        write_png(&dir.path().join(name), 100);
    }
    let mut ctx = Context::init(config(100, false));
    let first = ctx.load(&[dir_source(&dir)]).unwrap();
    ctx.activate(first, 50, 30);
    ctx.pump(IDLE);

    ctx.gallery_mut().skip_current(true);
    ctx.pump(IDLE);
    assert_eq!(ctx.list().lock().len(), 1);
    assert_eq!(ctx.gallery().info(), "[1/1] b.png");

    ctx.gallery_mut().switch_aa();
    assert!(!has_thumbnail(&ctx, &src(&dir, "b.png")));
    ctx.pump(IDLE);
    assert!(has_thumbnail(&ctx, &src(&dir, "b.png")));

    ctx.gallery_mut().skip_current(true);
    assert_eq!(ctx.pump(IDLE), Some(0));
}

#[test]
fn nothing_to_show() {
    let dir = tempfile::tempdir().unwrap();
    let mut ctx = Context::init(config(100, false));
    assert!(ctx.load(&[dir_source(&dir)]).is_none());
}

#[test]
fn undecodable_selection_hands_over_to_its_neighbour() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.png"), b"not an image").unwrap();
    write_png(&dir.path().join("b.png"), 100);

    let mut ctx = Context::init(config(100, false));
    let first = ctx.load(&[dir_source(&dir)]).unwrap();
    ctx.activate(first, 50, 30);
    assert_eq!(ctx.gallery().info(), "[1/2] a.png");

    assert_eq!(ctx.pump(IDLE), None);
    assert_eq!(ctx.list().lock().len(), 1);
    assert_eq!(ctx.gallery().info(), "[1/1] b.png");
    let details = ctx.gallery().details();
    assert_eq!(details[0], "Format: PNG 16x16");
    assert!(details[1].starts_with("File size: "));
}

#[test]
fn created_entry_in_front_shifts_the_selection_index() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["b.png", "c.png"] {
        write_png(&dir.path().join(name), 100);
    }
    let mut ctx = Context::init(config(100, false));
    let first = ctx.load(&[dir_source(&dir)]).unwrap();
    ctx.activate(first, 50, 30);
    ctx.pump(IDLE);
    assert_eq!(ctx.gallery().info(), "[1/2] b.png");

    write_png(&dir.path().join("a.png"), 50);
    ctx.events()
        .send(AppEvent::Fs(FsEvent::new(FsEventKind::Create, src(&dir, "a.png"))));
    ctx.pump(IDLE);
    assert_eq!(ctx.list().lock().len(), 3);
    assert_eq!(ctx.gallery().info(), "[2/3] b.png");
}

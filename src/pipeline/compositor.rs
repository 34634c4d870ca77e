use std::{collections::HashMap, time::Instant};

use anyhow::{Context, Result};
use fast_image_resize as fir;
use image::RgbaImage;
use rand::Rng;
use rayon::prelude::*;

use super::catalog::Catalog;
use crate::{
    config::Mode,
    sim::{
        Simulation,
        garden::Garden,
        particle::{Element, Particle},
    },
    types::Frame,
};

const SOIL_COLOR: [u8; 4] = [20, 50, 20, 255];
const GRASS_COLOR: [u8; 4] = [50, 200, 50, 255];
const GRASS_LINE_THICKNESS: i64 = 2;
/// Plants stand this many pixels above the bottom edge.
const PLANT_BASELINE_LIFT: i32 = 5;
const CHAR_DARKENING: f32 = 0.8;
const DIM_GAIN: f32 = 0.8;
const DIM_OFFSET: f32 = -10.0;
const SPRITE_CACHE_LIMIT: usize = 512;

const WHITE: [u8; 4] = [255, 255, 255, 255];
const FLAME_ORANGE: [u8; 4] = [255, 165, 0, 255];
const EMBER_RED: [u8; 4] = [200, 0, 0, 255];

type SpriteKey = (usize, u32, u32);

/// Draws the garden and its particles over the camera frame.
pub struct Compositor {
    resizer: fir::Resizer,
    sprites: HashMap<SpriteKey, Vec<u8>>,
}

impl Compositor {
    pub fn new() -> Self {
        Self {
            resizer: fir::Resizer::new(),
            sprites: HashMap::new(),
        }
    }

    /// Produces the outgoing frame for this tick. Puppet mode passes the
    /// background through untouched; the client draws the puppets.
    pub fn render<R: Rng>(
        &mut self,
        sim: &Simulation<R>,
        catalog: &Catalog,
        background: Option<Frame>,
    ) -> Frame {
        let (width, height) = sim.frame_size();
        let mut frame = background
            .filter(|f| f.rgba.len() == (f.width as usize) * (f.height as usize) * 4)
            .unwrap_or_else(|| Frame::blank(width, height));

        if sim.mode() == Mode::Garden {
            self.compose_garden(&mut frame, sim.garden(), sim.particles(), catalog);
        }
        frame.timestamp = Instant::now();
        frame
    }

    pub fn compose_garden(
        &mut self,
        frame: &mut Frame,
        garden: &Garden,
        particles: &[Particle],
        catalog: &Catalog,
    ) {
        let (w, h) = (frame.width, frame.height);
        let ground_y = garden.ground_y() as i64;
        fill_rect(frame, 0, ground_y, w as i64, h as i64, SOIL_COLOR);
        fill_rect(frame, 0, ground_y, w as i64, ground_y + GRASS_LINE_THICKNESS, GRASS_COLOR);

        let baseline = garden.floor_y() as i32 - PLANT_BASELINE_LIFT;
        for (idx, slot) in garden.slots().iter().enumerate() {
            let draw_h = slot.height as u32;
            let Some(variant) = slot.variant else {
                continue;
            };
            if draw_h == 0 {
                continue;
            }
            let Some(aspect) = catalog.aspect(variant) else {
                continue;
            };
            let draw_w = (draw_h as f32 * aspect) as u32;
            if draw_w == 0 {
                continue;
            }
            let Some(sprite) = self.sprite(catalog, variant, draw_w, draw_h) else {
                continue;
            };
            let shade = 1.0 - slot.char_level.clamp(0.0, 1.0) * CHAR_DARKENING;
            blit_sprite(
                frame,
                sprite,
                draw_w,
                draw_h,
                garden.slot_center_x(idx) as i32,
                baseline,
                shade,
            );
        }

        dim(&mut frame.rgba);

        for particle in particles.iter().filter(|p| p.is_alive()) {
            draw_particle(frame, particle);
        }
    }

    fn sprite(&mut self, catalog: &Catalog, id: usize, w: u32, h: u32) -> Option<&[u8]> {
        let key = (id, w, h);
        if !self.sprites.contains_key(&key) {
            if self.sprites.len() >= SPRITE_CACHE_LIMIT {
                self.sprites.clear();
            }
            let src = catalog.get(id)?;
            match resize_rgba(&mut self.resizer, src, w, h) {
                Ok(pixels) => {
                    self.sprites.insert(key, pixels);
                }
                Err(err) => {
                    log::warn!("failed to scale plant variant {id} to {w}x{h}: {err:?}");
                    return None;
                }
            }
        }
        self.sprites.get(&key).map(Vec::as_slice)
    }
}

impl Default for Compositor {
    fn default() -> Self {
        Self::new()
    }
}

fn resize_rgba(resizer: &mut fir::Resizer, src: &RgbaImage, w: u32, h: u32) -> Result<Vec<u8>> {
    let src_image = fir::images::Image::from_vec_u8(
        src.width(),
        src.height(),
        src.as_raw().clone(),
        fir::PixelType::U8x4,
    )?;
    let mut dst_image = fir::images::Image::new(w, h, fir::PixelType::U8x4);
    let resize_options = fir::ResizeOptions::new()
        .resize_alg(fir::ResizeAlg::Interpolation(fir::FilterType::Bilinear));
    resizer
        .resize(&src_image, &mut dst_image, Some(&resize_options))
        .context("fast resize failed")?;
    Ok(dst_image.into_vec())
}

/// Alpha-blends `sprite` with its bottom edge centred on `(center_x, bottom_y)`,
/// scaling its colour channels by `shade`.
fn blit_sprite(
    frame: &mut Frame,
    sprite: &[u8],
    sprite_w: u32,
    sprite_h: u32,
    center_x: i32,
    bottom_y: i32,
    shade: f32,
) {
    let left = center_x - (sprite_w / 2) as i32;
    let top = bottom_y - sprite_h as i32;
    let (fw, fh) = (frame.width as i32, frame.height as i32);

    for sy in 0..sprite_h as i32 {
        let y = top + sy;
        if y < 0 || y >= fh {
            continue;
        }
        for sx in 0..sprite_w as i32 {
            let x = left + sx;
            if x < 0 || x >= fw {
                continue;
            }
            let src_idx = ((sy as u32 * sprite_w + sx as u32) as usize) * 4;
            let dst_idx = ((y as u32 * frame.width + x as u32) as usize) * 4;
            let (Some(src), Some(dst)) = (
                sprite.get(src_idx..src_idx + 4),
                frame.rgba.get_mut(dst_idx..dst_idx + 4),
            ) else {
                continue;
            };
            let alpha = src[3] as f32 / 255.0;
            for c in 0..3 {
                let s = src[c] as f32 * shade;
                dst[c] = (alpha * s + (1.0 - alpha) * dst[c] as f32).round() as u8;
            }
        }
    }
}

/// Contrast drop applied to the whole frame before particles go on top.
fn dim(buffer: &mut [u8]) {
    buffer.par_chunks_exact_mut(4).for_each(|px| {
        for c in px.iter_mut().take(3) {
            *c = (*c as f32 * DIM_GAIN + DIM_OFFSET).abs().min(255.0).round() as u8;
        }
    });
}

fn draw_particle(frame: &mut Frame, particle: &Particle) {
    let (x, y) = (particle.position.x, particle.position.y);
    let reach = particle.size as f32 + particle.velocity.y.abs();
    if !on_canvas(frame, x, y, reach) {
        return;
    }
    let (cx, cy) = (x as i64, y as i64);

    match particle.element {
        Element::Fire => {
            let color = if particle.life > 0.7 {
                WHITE
            } else if particle.life > 0.4 {
                FLAME_ORANGE
            } else {
                EMBER_RED
            };
            fill_disc(frame, cx, cy, (particle.size as f32 * particle.life) as i64, color);
        }
        Element::Water => {
            // Streak trails back along the last step.
            let tail = (y - particle.velocity.y) as i64;
            let half = (particle.size.max(1) as i64 - 1) / 2;
            fill_rect(frame, cx - half, cy.min(tail), cx + half + 1, cy.max(tail) + 1, WHITE);
        }
        Element::Ash => {
            let grey = (50.0 + particle.life * 100.0) as u8;
            fill_disc(frame, cx, cy, particle.size as i64, [grey, grey, grey, 255]);
        }
    }
}

/// False for non-finite positions and anything further than `reach` off the frame.
fn on_canvas(frame: &Frame, x: f32, y: f32, reach: f32) -> bool {
    let (w, h) = (frame.width as f32, frame.height as f32);
    x.is_finite()
        && y.is_finite()
        && (-reach..=w + reach).contains(&x)
        && (-reach..=h + reach).contains(&y)
}

/// Paints `[x0, x1) x [y0, y1)`, clipped to the frame.
fn fill_rect(frame: &mut Frame, x0: i64, y0: i64, x1: i64, y1: i64, color: [u8; 4]) {
    for y in y0.max(0)..y1.min(frame.height as i64) {
        fill_span(frame, y, x0, x1, color);
    }
}

fn fill_disc(frame: &mut Frame, cx: i64, cy: i64, radius: i64, color: [u8; 4]) {
    let r = radius.max(0);
    for dy in -r..=r {
        let half = ((r * r - dy * dy) as f64).sqrt() as i64;
        fill_span(frame, cy + dy, cx - half, cx + half + 1, color);
    }
}

/// One row of `[x0, x1)` at `y`. Out-of-frame parts are dropped.
fn fill_span(frame: &mut Frame, y: i64, x0: i64, x1: i64, color: [u8; 4]) {
    let (w, h) = (frame.width as i64, frame.height as i64);
    let (lo, hi) = (x0.max(0), x1.min(w));
    if y < 0 || y >= h || lo >= hi {
        return;
    }
    let row = (y * w) as usize;
    let range = (row + lo as usize) * 4..(row + hi as usize) * 4;
    if let Some(pixels) = frame.rgba.get_mut(range) {
        for px in pixels.chunks_exact_mut(4) {
            px.copy_from_slice(&color);
        }
    }
}

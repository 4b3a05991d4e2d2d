//! Glyph-grid compositor.
//!
//! Paints the environment backdrop across the full canvas, then stamps each
//! entity's pattern at its position. Spaces in a pattern are transparent so
//! the backdrop shows through; anything past the canvas edge is clipped.

use crate::registry::{EntityRegistry, environment_backdrop};
use crate::{Entity, Environment, GRID_HEIGHT, GRID_WIDTH};

/// Canvas width in character cells (columns 0..=GRID_WIDTH).
pub const CANVAS_WIDTH: usize = GRID_WIDTH as usize + 1;
/// Canvas height in character cells (rows 0..=GRID_HEIGHT).
pub const CANVAS_HEIGHT: usize = GRID_HEIGHT as usize + 1;

/// Render the ecosystem as one string per canvas row.
#[must_use]
pub fn compose_grid(
    environment: Environment,
    environment_frame: u64,
    entities: &[Entity],
    registry: &EntityRegistry,
) -> Vec<String> {
    let backdrop = environment_backdrop(environment);
    let offset = (environment_frame % backdrop.len() as u64) as usize;
    let mut rows: Vec<Vec<char>> = (0..CANVAS_HEIGHT)
        .map(|y| {
            let line: Vec<char> = backdrop[(y + offset) % backdrop.len()].chars().collect();
            (0..CANVAS_WIDTH).map(|x| line[x % line.len()]).collect()
        })
        .collect();

    for entity in entities {
        let stored;
        let pattern: &[String] = if entity.pattern.is_empty() {
            stored = registry.variant(&entity.kind, entity.frame);
            &stored
        } else {
            &entity.pattern
        };
        stamp(&mut rows, entity, pattern);
    }

    rows.into_iter().map(String::from_iter).collect()
}

fn stamp(rows: &mut [Vec<char>], entity: &Entity, pattern: &[String]) {
    let Ok(x0) = usize::try_from(entity.position.x) else {
        return;
    };
    let Ok(y0) = usize::try_from(entity.position.y) else {
        return;
    };
    for (dy, line) in pattern.iter().enumerate() {
        let y = y0 + dy;
        if y >= rows.len() {
            break;
        }
        for (dx, ch) in line.chars().enumerate() {
            if ch == ' ' {
                continue;
            }
            let x = x0 + dx;
            if x >= rows[y].len() {
                break;
            }
            rows[y][x] = ch;
        }
    }
}

//! Drawing instructions produced by the renderers. Coordinates are row-local:
//! x in viewer pixels, y from the top of the row.

use palette::Srgba;

pub type Color = Srgba<u8>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Polyline {
        points: Vec<Point>,
        color: Color,
        width: f64,
    },
    Polygon {
        points: Vec<Point>,
        fill: Color,
        stroke: Option<Color>,
    },
    Rect {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        color: Color,
    },
    Text {
        x: f64,
        y: f64,
        text: String,
        color: Color,
        align: TextAlign,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrawList {
    commands: Vec<DrawCommand>,
}

impl DrawList {
    pub fn push(&mut self, command: DrawCommand) {
        self.commands.push(command);
    }

    /// Skips lines with fewer than two points.
    pub fn polyline(&mut self, points: Vec<Point>, color: Color, width: f64) {
        if points.len() >= 2 {
            self.commands.push(DrawCommand::Polyline {
                points,
                color,
                width,
            });
        }
    }

    pub fn rect(&mut self, x: f64, y: f64, width: f64, height: f64, color: Color) {
        if width > 0.0 && height > 0.0 {
            self.commands.push(DrawCommand::Rect {
                x,
                y,
                width,
                height,
                color,
            });
        }
    }

    pub fn text(&mut self, x: f64, y: f64, text: impl Into<String>, color: Color, align: TextAlign) {
        self.commands.push(DrawCommand::Text {
            x,
            y,
            text: text.into(),
            color,
            align,
        });
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn into_commands(self) -> Vec<DrawCommand> {
        self.commands
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn polylines(&self) -> impl Iterator<Item = &[Point]> {
        self.commands.iter().filter_map(|command| match command {
            DrawCommand::Polyline { points, .. } => Some(points.as_slice()),
            _ => None,
        })
    }

    pub fn texts(&self) -> impl Iterator<Item = (f64, &str)> {
        self.commands.iter().filter_map(|command| match command {
            DrawCommand::Text { x, text, .. } => Some((*x, text.as_str())),
            _ => None,
        })
    }

    pub fn rects_of(&self, color: Color) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.commands.iter().filter_map(move |command| match command {
            DrawCommand::Rect { x, width, color: c, .. } if *c == color => Some((*x, *width)),
            _ => None,
        })
    }
}

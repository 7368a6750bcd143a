//! css color parsing and the opacity rewrite used for high contrast

/// an rgba color with a 0..=1 alpha
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    /// red
    pub r: u8,
    /// green
    pub g: u8,
    /// blue
    pub b: u8,
    /// alpha
    pub a: f32,
}

impl Rgba {
    /// whether the color is fully opaque
    pub fn is_opaque(&self) -> bool {
        self.a >= 1.0
    }

    /// format as `#rrggbb`, dropping alpha
    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// convert a css color string into an `Rgba`
///
/// named colors beyond `transparent`, `black` and `white` aren't supported, `hsl()` colors are
/// recognised by [`is_color`] but not converted
pub fn parse_color(color_str: &str) -> Option<Rgba> {
    let s = color_str.trim().to_lowercase();

    match s.as_str() {
        "transparent" => Some(Rgba { r: 0, g: 0, b: 0, a: 0.0 }),
        "black" => Some(Rgba { r: 0, g: 0, b: 0, a: 1.0 }),
        "white" => Some(Rgba { r: 255, g: 255, b: 255, a: 1.0 }),
        _ if s.starts_with('#') => parse_hex_color(&s),
        _ if s.starts_with("rgb") => parse_rgb_function(&s),
        _ => None,
    }
}

/// whether a string is a color this module understands
pub fn is_color(s: &str) -> bool {
    let lower = s.trim().to_lowercase();
    parse_color(&lower).is_some() || function_args(&lower, "hsl").is_some()
}

/// parse a hex code (`#rgb`, `#rgba`, `#rrggbb`, `#rrggbbaa`)
fn parse_hex_color(color_str: &str) -> Option<Rgba> {
    let hex = color_str.strip_prefix('#')?;
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }

    let short = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|v| v * 17);
    let long = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();

    match hex.len() {
        3 => Some(Rgba { r: short(0)?, g: short(1)?, b: short(2)?, a: 1.0 }),
        4 => Some(Rgba {
            r: short(0)?,
            g: short(1)?,
            b: short(2)?,
            a: short(3)? as f32 / 255.0,
        }),
        6 => Some(Rgba { r: long(0)?, g: long(2)?, b: long(4)?, a: 1.0 }),
        8 => Some(Rgba {
            r: long(0)?,
            g: long(2)?,
            b: long(4)?,
            a: long(6)? as f32 / 255.0,
        }),
        _ => None,
    }
}

/// parse `rgb()`/`rgba()` in either comma or space syntax
fn parse_rgb_function(s: &str) -> Option<Rgba> {
    let args = function_args(s, "rgb")?;
    let channel = |v: &str| -> Option<u8> {
        match v.strip_suffix('%') {
            Some(pct) => pct.parse::<f32>().ok().map(|p| (p.clamp(0.0, 100.0) * 2.55).round() as u8),
            None => v.parse::<f32>().ok().map(|c| c.clamp(0.0, 255.0).round() as u8),
        }
    };

    let (r, g, b) = (channel(args.first()?)?, channel(args.get(1)?)?, channel(args.get(2)?)?);
    let a = match args.get(3) {
        Some(v) => parse_alpha(v)?,
        None => 1.0,
    };

    if args.len() > 4 {
        return None;
    }

    Some(Rgba { r, g, b, a })
}

/// parse an alpha component (`0.5` or `50%`)
fn parse_alpha(v: &str) -> Option<f32> {
    match v.strip_suffix('%') {
        Some(pct) => pct.parse::<f32>().ok().map(|p| (p / 100.0).clamp(0.0, 1.0)),
        None => v.parse::<f32>().ok().map(|a| a.clamp(0.0, 1.0)),
    }
}

/// split the arguments of `name(...)` / `namea(...)`
fn function_args(s: &str, name: &str) -> Option<Vec<String>> {
    let rest = s.strip_prefix(name)?;
    let rest = rest.strip_prefix('a').unwrap_or(rest);
    let inner = rest.strip_prefix('(')?.strip_suffix(')')?;

    let args: Vec<String> = inner
        .split([',', '/', ' '])
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(String::from)
        .collect();

    (args.len() == 3 || args.len() == 4).then_some(args)
}

/// rewrite a single color so that its alpha is 1, leaving anything else alone
fn opaque_color(part: &str) -> String {
    let lower = part.to_lowercase();

    if lower.starts_with('#') {
        return match parse_hex_color(&lower) {
            Some(c) => c.to_hex(),
            None => part.to_string(),
        };
    }

    if lower.starts_with("rgb") {
        return match parse_rgb_function(&lower) {
            Some(c) => format!("rgb({}, {}, {})", c.r, c.g, c.b),
            None => part.to_string(),
        };
    }

    if lower.starts_with("hsl")
        && let Some(args) = function_args(&lower, "hsl")
    {
        return format!("hsl({}, {}, {})", args[0], args[1], args[2]);
    }

    part.to_string()
}

/// force every color inside a css value to full opacity
///
/// handles composite values like `1px solid rgba(0, 0, 0, 0.1)`; parts that aren't colors
/// are kept verbatim
pub fn force_opaque(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut part = String::new();
    let mut depth = 0usize;

    for ch in value.chars() {
        match ch {
            '(' => {
                depth += 1;
                part.push(ch);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                part.push(ch);
            }
            c if c.is_whitespace() && depth == 0 => {
                if !part.is_empty() {
                    out.push_str(&opaque_color(&part));
                    part.clear();
                }
                out.push(c);
            }
            c => part.push(c),
        }
    }

    if !part.is_empty() {
        out.push_str(&opaque_color(&part));
    }

    out
}

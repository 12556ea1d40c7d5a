use console::{Emoji, style};

pub static SUCCESS_ICON: Emoji<'_, '_> = Emoji("✅ ", "");
pub static INFO_ICON: Emoji<'_, '_> = Emoji("ℹ️  ", "");
pub static WARN_ICON: Emoji<'_, '_> = Emoji("⚠️  ", "");
pub static ERROR_ICON: Emoji<'_, '_> = Emoji("❌ ", "");
pub static GEAR: Emoji<'_, '_> = Emoji("⚙️  ", "");
pub static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "");

pub fn print_success(msg: &str) {
    println!("{} {}", SUCCESS_ICON, style(msg).green());
}

pub fn print_info(msg: &str) {
    println!("{} {}", INFO_ICON, style(msg).blue());
}

pub fn print_warn(msg: &str) {
    println!("{} {}", WARN_ICON, style(msg).yellow());
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", ERROR_ICON, style(msg).red().bold());
}

/// A titled block of terminal output, built line by line and printed at once.
pub struct GuideSection {
    title: String,
    lines: Vec<String>,
}

impl GuideSection {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            lines: Vec::new(),
        }
    }

    pub fn status(mut self, label: &str, value: &str) -> Self {
        self.lines
            .push(format!("{} {}: {}", GEAR, style(label).bold().cyan(), value));
        self
    }

    pub fn info(mut self, msg: &str) -> Self {
        self.lines.push(format!("{} {}", INFO_ICON, msg));
        self
    }

    pub fn warn(mut self, msg: &str) -> Self {
        self.lines
            .push(format!("{} {}", WARN_ICON, style(msg).yellow()));
        self
    }

    pub fn text(mut self, msg: &str) -> Self {
        self.lines.push(msg.to_string());
        self
    }

    pub fn command(mut self, name: &str, description: &str) -> Self {
        self.lines.push(format!(
            "{:<24} {}",
            style(name).green().bold(),
            style(description).dim()
        ));
        self
    }

    pub fn hint(mut self, example: &str, note: &str) -> Self {
        if note.is_empty() {
            self.lines.push(format!("$ {}", style(example).cyan()));
        } else {
            self.lines
                .push(format!("$ {}  {}", style(example).cyan(), style(note).dim()));
        }
        self
    }

    pub fn blank(mut self) -> Self {
        self.lines.push(String::new());
        self
    }

    pub fn render(&self) -> String {
        let mut out = format!("\n {}\n", style(&self.title).bold().underlined());
        for line in &self.lines {
            if line.is_empty() {
                out.push('\n');
            } else {
                out.push_str(&format!("   {}\n", line));
            }
        }
        out
    }

    pub fn print(self) {
        print!("{}", self.render());
    }
}

pub fn print_banner() {
    let lines: &[&str] = &[
        "                                          ",
        " ___  ___ ___  _ __ ___| | _____  ___ _ __ ",
        "/ __|/ __/ _ \\| '__/ _ \\ |/ / _ \\/ _ \\ '_ \\",
        "\\__ \\ (_| (_) | | |  __/   <  __/  __/ |_) |",
        "|___/\\___\\___/|_|  \\___|_|\\_\\___|\\___| .__/",
        "                                     |_|   ",
    ];

    // Gradient: #f59e0b -> #ef4444 -> #8b5cf6
    let stops: [(u8, u8, u8); 3] = [(245, 158, 11), (239, 68, 68), (139, 92, 246)];
    let max_w = 44u32;
    let max_d = max_w + 5 * 10;

    println!();
    for (y, line) in lines.iter().enumerate() {
        for (x, ch) in line.chars().enumerate() {
            if ch == ' ' {
                print!(" ");
                continue;
            }
            let d = ((x as u32 + y as u32 * 10) * 1000 / max_d).min(1000);
            let (r, g, b) = if d <= 500 {
                lerp_color(stops[0], stops[1], d * 2)
            } else {
                lerp_color(stops[1], stops[2], (d - 500) * 2)
            };
            print!("\x1b[38;2;{};{};{}m{}", r, g, b, ch);
        }
        println!();
    }
    print!("\x1b[0m");

    println!("\x1b[38;2;239;68;68mLive scores, reconciled.\x1b[0m\n");
}

fn lerp_color(a: (u8, u8, u8), b: (u8, u8, u8), t: u32) -> (u8, u8, u8) {
    let r = (a.0 as u32 * (1000 - t) + b.0 as u32 * t) / 1000;
    let g = (a.1 as u32 * (1000 - t) + b.1 as u32 * t) / 1000;
    let b_val = (a.2 as u32 * (1000 - t) + b.2 as u32 * t) / 1000;
    (r as u8, g as u8, b_val as u8)
}

pub fn print_goodbye() {
    println!(
        "\n{} {}",
        SPARKLE,
        style("scorekeeper stopped. Final whistle.").bold().cyan()
    );
}

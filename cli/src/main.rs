use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{NaiveDateTime, TimeZone, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use log::{info, warn};
use place::{CanvasState, PlaceOutcome};
use store::{PixelStore, PixelStoreAdapter};
use structures::constants::DEFAULT_COLOR;
use structures::leaderboard::{self, TimeFrame};
use structures::{Coord, Grid, HexColor, PersistenceMode, Pixel, Settings, SETTINGS_FILE};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Settings file; missing means defaults
    #[clap(short, long, default_value = SETTINGS_FILE)]
    config: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Place one pixel and wait for the store to confirm it
    Place {
        x: i32,
        y: i32,
        /// Hex color such as #FF4500
        color: String,
        #[clap(short, long)]
        author: Option<String>,
    },
    /// Show who placed a pixel and when
    Info { x: i32, y: i32 },
    /// Render the canvas to an image
    Render {
        out_file: PathBuf,
        /// Render a MessagePack snapshot instead of the store
        #[clap(short, long)]
        snapshot: Option<PathBuf>,
        #[clap(long, default_value = "1")]
        scale: u32,
    },
    /// Save the canvas as a MessagePack grid snapshot
    Export { out_file: PathBuf },
    /// Load placements from an r/place CSV dump into the store
    Import { in_file: PathBuf },
    /// Top authors by pixels currently on the canvas
    Leaderboard {
        #[clap(value_enum, default_value = "all")]
        timeframe: Frame,
    },
    /// List the palette with color names
    Palette,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Frame {
    All,
    Daily,
    Weekly,
}

impl From<Frame> for TimeFrame {
    fn from(frame: Frame) -> Self {
        match frame {
            Frame::All => TimeFrame::All,
            Frame::Daily => TimeFrame::Daily,
            Frame::Weekly => TimeFrame::Weekly,
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let settings = Settings::load(&cli.config)
        .with_context(|| format!("Could not load {}", cli.config.display()))?;

    match cli.command {
        Commands::Place {
            x,
            y,
            color,
            author,
        } => place(settings, x, y, &color, author),
        Commands::Info { x, y } => {
            let adapter = PixelStoreAdapter::new(open_store(&settings)?, &settings.canvas);
            match adapter.fetch_one(x, y) {
                Some(pixel) => println!(
                    "({}, {}) {} {} placed by {} at {}",
                    pixel.x,
                    pixel.y,
                    pixel.color,
                    pixel.color.name(),
                    pixel.author(),
                    pixel.placed_at.to_rfc3339()
                ),
                None => println!("({}, {}) has never been placed", x, y),
            }
            Ok(())
        }
        Commands::Render {
            out_file,
            snapshot,
            scale,
        } => {
            let grid = match snapshot {
                Some(path) => {
                    let bytes = fs::read(&path)
                        .with_context(|| format!("Could not read {}", path.display()))?;
                    Grid::from_msgpack(&bytes)?
                }
                None => load_grid(&settings)?,
            };
            render(&grid, scale, &out_file)
        }
        Commands::Export { out_file } => {
            let grid = load_grid(&settings)?;
            fs::write(&out_file, grid.to_msgpack()?)
                .with_context(|| format!("Could not write {}", out_file.display()))?;
            info!("exported {0}x{0} grid to {1}", grid.size(), out_file.display());
            Ok(())
        }
        Commands::Import { in_file } => import(&settings, &in_file),
        Commands::Leaderboard { timeframe } => {
            let pixels = open_store(&settings)?.fetch_all(None)?;
            let entries = leaderboard::rank(&pixels, timeframe.into(), Utc::now());

            for (position, entry) in entries.iter().enumerate() {
                println!(
                    "{:>2}. {:<24} {:>6}  last {}",
                    position + 1,
                    entry.name,
                    entry.count,
                    entry.last_placed.format("%Y-%m-%d %H:%M")
                );
            }
            Ok(())
        }
        Commands::Palette => {
            for color in &settings.canvas.palette {
                println!("{} {}", color, color.name());
            }
            Ok(())
        }
    }
}

fn open_store(settings: &Settings) -> Result<Arc<dyn PixelStore>> {
    store::open(&settings.store).context("Could not open pixel store")
}

fn place(settings: Settings, x: i32, y: i32, color: &str, author: Option<String>) -> Result<()> {
    let color = HexColor::parse(color)?;
    let mut config = settings.canvas.clone();
    config.persistence = PersistenceMode::Awaited;

    let adapter = PixelStoreAdapter::new(open_store(&settings)?, &config);
    let mut canvas = CanvasState::new(adapter, config);
    canvas.initialize();
    canvas.set_selected_color(color);
    canvas.set_nickname(author);

    let outcome = canvas.place_pixel(x, y);
    canvas.shutdown();

    match outcome {
        PlaceOutcome::Accepted => {
            println!("placed {} {} at ({}, {})", color, color.name(), x, y);
            Ok(())
        }
        PlaceOutcome::Failed => bail!("The store rejected the pixel at ({}, {})", x, y),
        PlaceOutcome::CoolingDown { remaining } => {
            bail!("Cooling down, {} seconds left", remaining)
        }
        PlaceOutcome::OutOfBounds => bail!(
            "({}, {}) is outside the {}x{} canvas",
            x,
            y,
            canvas.grid().size(),
            canvas.grid().size()
        ),
    }
}

fn load_grid(settings: &Settings) -> Result<Grid> {
    let pixels = open_store(settings)?.fetch_all(settings.canvas.fetch_limit)?;
    let mut grid = Grid::new(settings.canvas.grid_size, settings.canvas.default_color);

    let painted = grid.paint(&pixels);
    if painted != pixels.len() {
        warn!("{} stored pixels fall outside the grid", pixels.len() - painted);
    }

    Ok(grid)
}

fn render(grid: &Grid, scale: u32, out_file: &Path) -> Result<()> {
    let image = draw(grid, scale)?;

    image
        .save(out_file)
        .with_context(|| format!("Could not save {}", out_file.display()))?;
    info!(
        "rendered {}x{} image to {}",
        image.width(),
        image.height(),
        out_file.display()
    );
    Ok(())
}

fn draw(grid: &Grid, scale: u32) -> Result<image::RgbImage> {
    if scale == 0 {
        bail!("Scale must be at least 1");
    }

    let Some(side) = (grid.size() as u32).checked_mul(scale) else {
        bail!("Scale {} is too large for a {}x{} grid", scale, grid.size(), grid.size());
    };

    Ok(image::RgbImage::from_fn(side, side, |x, y| {
        let coord = Coord::new((x / scale) as u16, (y / scale) as u16);
        let color = grid.get(coord).unwrap_or(DEFAULT_COLOR);
        image::Rgb(color.rgb())
    }))
}

fn import(settings: &Settings, in_file: &Path) -> Result<()> {
    let store = open_store(settings)?;
    let size = settings.canvas.grid_size;

    let file =
        File::open(in_file).with_context(|| format!("Could not open {}", in_file.display()))?;
    let mut reader = csv::Reader::from_reader(file);

    let mut imported = 0usize;
    let mut skipped = 0usize;

    for result in reader.records() {
        let record = result?;

        let pixel = match parse_record(&record, size) {
            Ok(Some(pixel)) => pixel,
            Ok(None) => {
                skipped += 1;
                continue;
            }
            Err(err) => {
                warn!("skipped record {:?}: {}", record.position(), err);
                skipped += 1;
                continue;
            }
        };

        store.upsert(&pixel)?;
        imported += 1;

        if imported % 100_000 == 0 {
            info!("imported {} pixels", imported);
        }
    }

    info!("imported {} pixels, skipped {}", imported, skipped);
    Ok(())
}

// Returns `None` for rows that do not describe one pixel on this canvas,
// like moderation rectangles or coordinates beyond the grid.
fn parse_record(record: &csv::StringRecord, size: u16) -> Result<Option<Pixel>> {
    let field = |index: usize| {
        record
            .get(index)
            .ok_or_else(|| anyhow!("missing column {}", index))
    };

    let timestamp = field(0)?;
    let placed_at = NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%d %H:%M:%S%.f UTC")
        .or_else(|_| NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%d %H:%M:%S UTC"))
        .with_context(|| format!("bad timestamp {}", timestamp))?;
    let placed_at = Utc.from_utc_datetime(&placed_at);

    let author = field(1)?;
    let color = HexColor::parse(field(2)?)?;

    let clean_coords = field(3)?.replace('"', "");
    let coords: Vec<&str> = clean_coords.split(',').collect();
    let [x, y] = coords.as_slice() else {
        return Ok(None);
    };

    let x = x.trim().parse::<i32>().context("bad x coordinate")?;
    let y = y.trim().parse::<i32>().context("bad y coordinate")?;

    Ok(Coord::checked(x, y, size).map(|coord| Pixel::new(coord, color, Some(author), placed_at)))
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, Timelike};
    use csv::StringRecord;

    use super::*;

    fn record(fields: &[&str]) -> StringRecord {
        StringRecord::from(fields.to_vec())
    }

    #[test]
    fn parses_a_dump_row() {
        let row = record(&["2022-04-04 00:53:51.577 UTC", "user-a", "#00CCC0", "\"42,7\""]);

        let pixel = parse_record(&row, 200).unwrap().unwrap();
        assert_eq!(pixel.coord(), Coord::new(42, 7));
        assert_eq!(pixel.color, HexColor::from_rgb(0x00, 0xCC, 0xC0));
        assert_eq!(pixel.author(), "user-a");
        assert_eq!(pixel.placed_at.nanosecond(), 577_000_000);
    }

    #[test]
    fn accepts_timestamps_without_fraction() {
        let row = record(&["2022-04-01 12:44:10 UTC", "user-b", "#FFFFFF", "0,0"]);

        let pixel = parse_record(&row, 200).unwrap().unwrap();
        assert_eq!(pixel.placed_at.day(), 1);
        assert_eq!(pixel.placed_at.second(), 10);
    }

    #[test]
    fn skips_rectangles_and_off_grid_rows() {
        let rectangle = record(&["2022-04-04 01:00:00 UTC", "mod", "#000000", "1,1,5,5"]);
        let off_grid = record(&["2022-04-04 01:00:00 UTC", "user", "#000000", "1500,3"]);
        let negative = record(&["2022-04-04 01:00:00 UTC", "user", "#000000", "-1,3"]);

        assert_eq!(parse_record(&rectangle, 200).unwrap(), None);
        assert_eq!(parse_record(&off_grid, 200).unwrap(), None);
        assert_eq!(parse_record(&negative, 200).unwrap(), None);
    }

    #[test]
    fn rejects_malformed_rows() {
        let color = record(&["2022-04-04 01:00:00 UTC", "user", "teal", "1,1"]);
        let timestamp = record(&["yesterday", "user", "#000000", "1,1"]);
        let coordinate = record(&["2022-04-04 01:00:00 UTC", "user", "#000000", "a,1"]);
        let short = record(&["2022-04-04 01:00:00 UTC", "user"]);

        assert!(parse_record(&color, 200).is_err());
        assert!(parse_record(&timestamp, 200).is_err());
        assert!(parse_record(&coordinate, 200).is_err());
        assert!(parse_record(&short, 200).is_err());
    }

    #[test]
    fn draw_scales_each_cell() {
        let red = HexColor::from_rgb(0xFF, 0, 0);
        let mut grid = Grid::new(4, DEFAULT_COLOR);
        grid.set(Coord::new(1, 2), red);

        let image = draw(&grid, 3).unwrap();

        assert_eq!(image.dimensions(), (12, 12));
        for (x, y) in [(3, 6), (5, 8), (4, 7)] {
            assert_eq!(image.get_pixel(x, y).0, red.rgb());
        }
        assert_eq!(image.get_pixel(2, 6).0, DEFAULT_COLOR.rgb());
        assert_eq!(image.get_pixel(6, 6).0, DEFAULT_COLOR.rgb());
    }

    #[test]
    fn draw_rejects_bad_scales() {
        let grid = Grid::new(200, DEFAULT_COLOR);

        assert!(draw(&grid, 0).is_err());
        assert!(draw(&grid, u32::MAX).is_err());
    }
}

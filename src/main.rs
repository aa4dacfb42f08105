//! # Rotulo CLI
//!
//! Command-line interface for thermal label printing.
//!
//! ## Usage
//!
//! ```bash
//! # List paired printers
//! rotulo devices
//!
//! # Render a template to PNG for inspection
//! rotulo preview --template tag.html --field spec=500g --field qrDataUrl=SKU123 --png out.png
//!
//! # Emit the command stream (wire text) without printing
//! rotulo encode --template tag.html --field spec=500g --printer-type portable
//!
//! # Print to a paired printer by address
//! rotulo print --template tag.html --field spec=500g \
//!     --printer-type desktop --copies 2 --address 00:11:62:AA:BB:CC
//!
//! # Dry-run: write the raw byte stream to a file
//! rotulo print --template tag.html --field spec=500g --device /tmp/label.bin
//! ```

use std::fs;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use rotulo::{
    LabelConfig, PrinterKind, RotuloError,
    client::PrintClient,
    label::{LabelTemplate, RenderRequest},
    render::{self, BinarizePolicy, HeadlessBrowser, RenderEngine},
    transport::{BluetoothTransport, bluetooth},
};

/// Rotulo - thermal label printer utility
#[derive(Parser, Debug)]
#[command(name = "rotulo")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List paired Bluetooth printers
    Devices,

    /// Render a template to a PNG preview
    Preview {
        #[command(flatten)]
        job: JobArgs,

        /// Output PNG path
        #[arg(long, value_name = "FILE")]
        png: PathBuf,
    },

    /// Emit the encoded command stream as wire text
    Encode {
        #[command(flatten)]
        job: JobArgs,

        /// Write to a file instead of stdout
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },

    /// Render and print a label
    Print {
        #[command(flatten)]
        job: JobArgs,

        /// Printer Bluetooth address (e.g. 00:11:62:AA:BB:CC)
        #[arg(long)]
        address: Option<String>,

        /// Device node or file to write to instead of connecting by address
        #[arg(long, value_name = "PATH")]
        device: Option<PathBuf>,
    },
}

/// Template + field arguments shared by preview/encode/print.
#[derive(clap::Args, Debug)]
struct JobArgs {
    /// Template markup file
    #[arg(long, value_name = "FILE")]
    template: PathBuf,

    /// Field values as name=value (repeatable)
    #[arg(long = "field", value_name = "NAME=VALUE")]
    fields: Vec<String>,

    /// Target printer family
    #[arg(long, value_enum, default_value = "desktop")]
    printer_type: PrinterTypeArg,

    /// Copy count
    #[arg(long, default_value = "1")]
    copies: u32,

    /// Use the legacy text-field path instead of bitmap rendering
    #[arg(long)]
    legacy: bool,

    /// Binarize with Bayer ordered dithering instead of a fixed threshold
    #[arg(long)]
    dither: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum PrinterTypeArg {
    Desktop,
    Portable,
}

impl From<PrinterTypeArg> for PrinterKind {
    fn from(arg: PrinterTypeArg) -> Self {
        match arg {
            PrinterTypeArg::Desktop => PrinterKind::Desktop,
            PrinterTypeArg::Portable => PrinterKind::Portable,
        }
    }
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), RotuloError> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Devices => {
            let devices = BluetoothTransport::paired_devices()?;
            if devices.is_empty() {
                println!("No paired devices.");
            }
            for device in devices {
                println!(
                    "{}  {}",
                    device.address,
                    device.name.as_deref().unwrap_or("(unnamed)")
                );
            }
            Ok(())
        }

        Commands::Preview { job, png } => {
            let (template, request) = load_job(&job)?;
            let markup = rotulo::label::substitute(&template.body, &request.fields)?;
            let config = LabelConfig::default();
            let engine = HeadlessBrowser::detect().ok();
            let engine_ref = engine.as_ref().map(|e| e as &dyn RenderEngine);
            let image = render::render_with_fallback(
                engine_ref,
                &markup,
                &request.fallback_lines(&template.name),
                config.width_dots(),
                config.height_dots(),
            );
            image
                .save(&png)
                .map_err(|e| RotuloError::Image(format!("failed to save preview: {}", e)))?;
            eprintln!("Wrote {}", png.display());
            Ok(())
        }

        Commands::Encode { job, out } => {
            let (template, request) = load_job(&job)?;
            let client = build_client(&job, NullTransport);
            let response = client.render_response(&template, &request)?;
            match out {
                Some(path) => {
                    fs::write(&path, response.command_stream)?;
                    eprintln!("Wrote {}", path.display());
                }
                None => println!("{}", response.command_stream),
            }
            Ok(())
        }

        Commands::Print {
            job,
            address,
            device,
        } => {
            let (template, request) = load_job(&job)?;
            let mut client = build_client(&job, BluetoothTransport::new());

            match (address, device) {
                (Some(address), None) => {
                    if !bluetooth::is_valid_mac(&address) {
                        eprintln!("Note: {} is not MAC-shaped, trying anyway", address);
                    }
                    client.connect(&address, request.printer)?;
                }
                (None, Some(path)) => {
                    client.transport_mut().connect_path(&path)?;
                }
                _ => {
                    return Err(RotuloError::Connect(
                        "pass exactly one of --address or --device".into(),
                    ));
                }
            }

            let result = client.print(&template, &request);
            client.disconnect();
            result?;
            eprintln!("Printed {} copy(ies).", request.copies);
            Ok(())
        }
    }
}

/// Transport stub for `encode`, which never performs I/O.
struct NullTransport;

impl rotulo::transport::Transport for NullTransport {
    fn send(&mut self, _stream: &rotulo::CommandStream) -> Result<(), RotuloError> {
        Err(RotuloError::Transport("encode-only client".into()))
    }
}

fn build_client<T: rotulo::transport::Transport>(job: &JobArgs, transport: T) -> PrintClient<T> {
    let policy = if job.dither {
        BinarizePolicy::Bayer
    } else {
        BinarizePolicy::default()
    };
    PrintClient::over(transport).with_policy(policy)
}

fn load_job(args: &JobArgs) -> Result<(LabelTemplate, RenderRequest), RotuloError> {
    let body = fs::read_to_string(&args.template)?;
    let name = args
        .template
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "label".to_string());

    let mut fields = Vec::with_capacity(args.fields.len());
    for raw in &args.fields {
        let Some((key, value)) = raw.split_once('=') else {
            return Err(RotuloError::Template(format!(
                "field `{}` is not NAME=VALUE",
                raw
            )));
        };
        fields.push((key.to_string(), value.to_string()));
    }

    let template = LabelTemplate {
        id: name.clone(),
        name,
        body,
        device_body: None,
        is_default: false,
    };
    let request = RenderRequest {
        fields,
        printer: args.printer_type.into(),
        copies: args.copies.max(1),
        render_as_bitmap: !args.legacy,
    };
    Ok((template, request))
}

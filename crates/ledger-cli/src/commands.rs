use std::path::PathBuf;

use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Load a ledger file, validate it, and print the normalized events.
    Validate {
        /// Input event-stream file
        file: PathBuf,
        /// Print the JSON Schema for the event stream instead of validating
        #[arg(long)]
        schema: bool,
    },
    /// Print the snapshot (positions, cash, prices, fx rates) as of a date.
    Snapshot {
        /// Input event-stream file
        file: PathBuf,
        /// Date to snapshot at (lenient form, e.g. `2025-03-14`, `+0d`, `0d`)
        #[arg(long)]
        date: String,
    },
    /// Print a period review (cash flow, gains, TWR) over a date range.
    Review {
        /// Input event-stream file
        file: PathBuf,
        /// Range start (lenient date form)
        #[arg(long)]
        from: String,
        /// Range end (lenient date form)
        #[arg(long)]
        to: String,
        /// Cost-basis method: "average" or "fifo"
        #[arg(long, default_value = "average")]
        method: String,
    },
}

use clap::{Parser, Subcommand};

/// Records the answers to the JFCE user satisfaction survey and computes the
/// dashboard indicators.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) A JSON configuration file. See the manual of survey_metrics for its keys.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (file path, default respostas.csv) The file holding the responses. Setting this option overrides
    /// the path that may be specified with the --config option.
    #[clap(short, long, value_parser)]
    pub data: Option<String>,

    /// (csv or xlsx, default csv) The type of the data file. Excel workbooks can only be read.
    #[clap(long, value_parser)]
    pub input_type: Option<String>,

    /// (default respostas) When using an Excel file, indicates the name of the worksheet to use.
    #[clap(long, value_parser)]
    pub excel_worksheet_name: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Validates a survey answer and appends it to the data file. Prints the new respondent id.
    Submit {
        /// (file path or '-') The answer, in JSON format. '-' reads it from the standard input.
        #[clap(long, value_parser)]
        draft: String,
    },
    /// Computes the dashboard over a selection of the responses, in JSON format.
    Report {
        /// (YYYY-MM-DD, default: date of the first response) First day of the selection.
        #[clap(long, value_parser)]
        start: Option<String>,
        /// (YYYY-MM-DD, default: date of the last response) Last day of the selection, included.
        #[clap(long, value_parser)]
        end: Option<String>,
        /// (optional) Only the responses of this unit.
        #[clap(long, value_parser)]
        unit: Option<String>,
        /// (optional) Only the responses of this user type.
        #[clap(long, value_parser)]
        user_type: Option<String>,
        /// (day, week or month, default day) The size of the timeline buckets.
        #[clap(long, value_parser)]
        granularity: Option<String>,
        /// (file path, 'stdout' or empty) Where the report is written.
        #[clap(short, long, value_parser)]
        out: Option<String>,
        /// (file path) A reference report in JSON format. If provided, the computed report must match it.
        #[clap(short, long, value_parser)]
        reference: Option<String>,
    },
    /// Copies the responses of an Excel workbook into the CSV data file, skipping known respondents.
    Import {
        /// (file path) The Excel workbook.
        #[clap(short, long, value_parser)]
        input: String,
        /// (optional) The worksheet to read. Overrides --excel-worksheet-name.
        #[clap(long, value_parser)]
        worksheet: Option<String>,
    },
}

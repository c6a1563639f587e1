pub mod handlers;

pub use handlers::{
    InitOutcome, ScanOverrides, format_scan_list, init_config_dir, load_config, model_failure,
    parse_url_line, record_scan,
};

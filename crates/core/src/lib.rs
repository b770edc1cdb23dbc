mod collision;
mod config;
mod exif_reader;
mod extractor;
mod geohash;
mod metadata;
mod paths;
mod pipeline;
mod progress;
mod reveal;
mod template;

pub use collision::{path_with_suffix, Substitution, SubstitutionBatch};
pub use config::{app_paths, load_config, reset_config, save_config, AppConfig, AppPaths};
pub use extractor::extract_metadata;
pub use metadata::{GeoLocation, ImageMetadata};
pub use paths::{add_start_directory, is_date_folder, normalize_path};
pub use pipeline::{
    OrganiseOptions, Organiser, RelocateError, RelocationMode, RelocationReport, RunReport,
    RunState, ScanReport, SkipReason,
};
pub use progress::{
    NoopObserver, ProgressEvent, ProgressObserver, RecordingObserver, RelocationStatus,
};
pub use reveal::open_host_location;
pub use template::{
    example_substitution, render_path, sample_metadata, unknown_placeholders, validate_template,
    ExampleSubstitution, Placeholder, SampleMetadata, TemplateError,
};

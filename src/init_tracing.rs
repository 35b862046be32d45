use tracing::subscriber::set_global_default;
use tracing_error::ErrorLayer;
use tracing_log::LogTracer;
use tracing_subscriber::{
    filter::Targets, fmt::format::FmtSpan, layer::SubscriberExt, Layer, Registry,
};

use crate::config::{LogFormat, Tracing};

pub(super) fn init_tracing(tracing: &Tracing) -> color_eyre::Result<()> {
    color_eyre::install()?;

    // mysql_async reports through the log crate
    LogTracer::init()?;

    let fmt_span = if tracing.logging.log_spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let format_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_span_events(fmt_span);

    let targets = tracing.logging.targets.targets.clone();

    match tracing.logging.format {
        LogFormat::Compact => with_format(format_layer.compact(), targets),
        LogFormat::Json => with_format(format_layer.json(), targets),
        LogFormat::Normal => with_format(format_layer, targets),
        LogFormat::Pretty => with_format(format_layer.pretty(), targets),
    }
}

fn with_format<F>(format_layer: F, targets: Targets) -> color_eyre::Result<()>
where
    F: Layer<Registry> + Send + Sync + 'static,
{
    let subscriber = Registry::default()
        .with(format_layer.with_filter(targets))
        .with(ErrorLayer::default());

    set_global_default(subscriber)?;

    Ok(())
}

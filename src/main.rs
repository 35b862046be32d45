#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    let kpi_migrate = kpi_migrate::KpiMigrateConfiguration::build_default()?;
    kpi_migrate.install_tracing()?;

    kpi_migrate.run().await
}

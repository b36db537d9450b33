use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = pinya_api::Args::parse();

	pinya_api::run(args).await
}

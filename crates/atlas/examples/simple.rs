use atlas::{AtlasLoader, Error, Spawner, Surface, WorkerConfig};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> Result<ExitCode, Error> {
    let spawner = Spawner::new(WorkerConfig::default());
    let workers = spawner.spawn_all(2, || Ok(AtlasLoader)).await?;

    for worker in &workers {
        let client = worker.client();
        let mut events = client.observe()?;

        client.ping().await?;
        let sum = client.crunch(1_000).await?;
        let surface = client
            .attach(Surface {
                id: worker.name().to_string(),
                width: 320,
                height: 200,
            })
            .await?;

        println!("{}: crunch = {sum}, attached {surface:?}", worker.name());
        if let Some(event) = events.recv().await {
            println!("{}: event {} = {}", worker.name(), event.name, event.value);
        }
    }

    for worker in workers {
        worker.terminate().await?;
    }

    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    jmdict_words_lib::run().await
}

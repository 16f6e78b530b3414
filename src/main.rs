fn main() -> anyhow::Result<()> {
    mathmentor_lib::run()
}

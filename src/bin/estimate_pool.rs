use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    annotation_sampler::example_apps::run_estimate_pool(std::env::args().skip(1))
}

use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    annotation_sampler::example_apps::run_rater(std::env::args().skip(1))
}

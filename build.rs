use std::{env, error::Error, fs};

include!("src/shader_constants.rs");

// All shaders reside in the 'src/shaders' directory
fn generate_shaders() -> std::result::Result<(), Box<dyn Error>> {
    let tera = tera::Tera::new("src/shaders/*.wgsl")?;
    println!("cargo:rerun-if-changed=src/shaders/");
    println!("cargo:rerun-if-changed=src/shader_constants.rs");
    let mut context = tera::Context::new();
    context.insert("update_workgroup_size", &UPDATE_WORKGROUP_SIZE);
    let output_path = env::var("OUT_DIR")?;
    fs::create_dir_all(format!("{}/shaders/", output_path))?;
    for file in fs::read_dir("src/shaders")? {
        let path = file?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("wgsl") {
            continue;
        }
        let file_name = path
            .file_name()
            .and_then(|f| f.to_str())
            .ok_or("shader file name is not valid utf-8")?;
        let result = tera.render(file_name, &context)?;
        fs::write(format!("{}/shaders/{}", output_path, file_name), result)?;
        println!("cargo:rerun-if-changed=src/shaders/{}", file_name);
    }
    Ok(())
}

fn main() {
    if let Err(err) = generate_shaders() {
        // panic here for a nicer error message, otherwise it will
        // be flattened to one line for some reason
        panic!("Unable to generate shaders\n{}", err);
    }
}

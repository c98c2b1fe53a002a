use std::{
    io::{self, Write},
    process::Command,
};

const SHADERS: &[(&str, &str)] = &[
    ("shaders/shader.vert", "shaders/vert.spv"),
    ("shaders/shader.frag", "shaders/frag.spv"),
];

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=shaders/shader.vert");
    println!("cargo:rerun-if-changed=shaders/shader.frag");

    for (source, output) in SHADERS {
        // glslc ships with the Vulkan SDK; when it is missing the engine
        // expects the compiled .spv files to already be on disk
        match Command::new("glslc").arg(source).arg("-o").arg(output).output() {
            Ok(result) => {
                io::stdout().write_all(&result.stdout)?;
                io::stderr().write_all(&result.stderr)?;
                if !result.status.success() {
                    return Err(format!("glslc failed to compile {source}").into());
                }
            }
            Err(_) => {
                println!("cargo:warning=glslc not found, skipping compilation of {source}");
            }
        }
    }

    Ok(())
}

use crate::config::McxConfig;

// --- Helper: Get Compiler ---
//
// Resolution order: explicit [build] entry, then the conventional environment
// variable, then the arm-none-eabi cross toolchain.
pub fn get_compiler(config: &McxConfig, has_cpp: bool) -> String {
    if let Some(build) = &config.build {
        if let Some(compiler) = &build.compiler {
            return compiler.clone();
        }
    }

    if has_cpp {
        if let Ok(env_cxx) = std::env::var("CXX") {
            return env_cxx;
        }
    } else if let Ok(env_cc) = std::env::var("CC") {
        return env_cc;
    }

    if has_cpp {
        "arm-none-eabi-g++".to_string()
    } else {
        "arm-none-eabi-gcc".to_string()
    }
}

// --- Helper: Get Objcopy ---
pub fn get_objcopy(config: &McxConfig) -> String {
    if let Some(build) = &config.build {
        if let Some(objcopy) = &build.objcopy {
            return objcopy.clone();
        }
    }

    if let Ok(env_objcopy) = std::env::var("OBJCOPY") {
        return env_objcopy;
    }

    "arm-none-eabi-objcopy".to_string()
}

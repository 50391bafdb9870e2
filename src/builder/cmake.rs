//! CMake recipe emitter.
//!
//! Renders a composed [`Project`] as a `CMakeLists.txt`: one object library
//! per package and language, one executable for the target and one per
//! discovered test suite. Bit packages come before the project's own and
//! are linked into every executable.

use std::collections::{BTreeSet, HashSet};

use crate::core::project::{Package, Project, Target};
use crate::util::config::DEFAULT_CMAKE_MINIMUM;

/// Recipe settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeOptions {
    pub cmake_minimum: String,
    pub cxx_standard: Option<u32>,
}

impl Default for RecipeOptions {
    fn default() -> Self {
        RecipeOptions {
            cmake_minimum: DEFAULT_CMAKE_MINIMUM.to_string(),
            cxx_standard: None,
        }
    }
}

/// Render the recipe for a composed project.
pub fn render(project: &Project, options: &RecipeOptions) -> String {
    let mut out = String::new();
    let target = &project.target;
    let test = &project.test;

    out.push_str(&format!(
        "cmake_minimum_required(VERSION {})\n",
        options.cmake_minimum
    ));
    match cmake_version(&project.version) {
        Some(version) => out.push_str(&format!(
            "project({} VERSION {} LANGUAGES C CXX)\n",
            identifier(&project.name),
            version
        )),
        None => out.push_str(&format!(
            "project({} LANGUAGES C CXX)\n",
            identifier(&project.name)
        )),
    }
    if let Some(standard) = options.cxx_standard {
        out.push_str(&format!("set(CMAKE_CXX_STANDARD {})\n", standard));
        out.push_str("set(CMAKE_CXX_STANDARD_REQUIRED ON)\n");
    }

    let mut includes: BTreeSet<&String> = BTreeSet::new();
    collect_includes(target, &mut includes);
    includes.extend(test.include_directories.iter());
    for bit in &test.bits {
        collect_includes(bit, &mut includes);
    }
    if !includes.is_empty() {
        out.push_str("\ninclude_directories(\n");
        for dir in includes {
            out.push_str(&format!("  {}\n", quote(dir)));
        }
        out.push_str(")\n");
    }

    let executable = identifier(&project.name);
    let mut emitted = Emitted::default();
    emitted.names.insert(executable.clone());
    for suite in &test.test_suites {
        emitted.names.insert(identifier(&suite.name));
    }
    let target_objects = emit_packages(&mut out, target.all_packages(), &mut emitted);

    let main_flags = if target.main.ends_with(".c") {
        &target.cflags
    } else {
        &target.cppflags
    };
    let mut libraries = Vec::new();
    collect_libraries(target, &mut libraries);

    out.push('\n');
    emit_executable(
        &mut out,
        &executable,
        &target.main,
        &target_objects,
        main_flags,
        &target.ldflags,
        &libraries,
    );
    for command in &target.post_build {
        out.push_str(&format!(
            "add_custom_command(TARGET {} POST_BUILD COMMAND {})\n",
            executable, command
        ));
    }

    if test.test_suites.is_empty() {
        return out;
    }

    let mut test_packages: Vec<&Package> = Vec::new();
    for bit in &test.bits {
        test_packages.extend(bit.all_packages());
    }
    test_packages.extend(test.packages.iter());
    let test_objects = emit_packages(&mut out, test_packages, &mut emitted);

    let mut objects = target_objects;
    objects.extend(test_objects);
    let flags: Vec<String> = target.cppflags.iter().chain(&test.cppflags).cloned().collect();
    let ldflags: Vec<String> = target.ldflags.iter().chain(&test.ldflags).cloned().collect();
    for library in &test.libraries {
        push_unique(&mut libraries, library);
    }
    for bit in &test.bits {
        collect_libraries(bit, &mut libraries);
    }

    for suite in &test.test_suites {
        out.push('\n');
        emit_executable(
            &mut out,
            &identifier(&suite.name),
            &suite.main,
            &objects,
            &flags,
            &ldflags,
            &libraries,
        );
    }

    out
}

/// Packages already emitted and the CMake target names taken so far.
#[derive(Debug, Default)]
struct Emitted<'p> {
    paths: HashSet<&'p str>,
    names: HashSet<String>,
}

impl Emitted<'_> {
    /// `name`, or `name_2`, `name_3`, ... when it is already taken.
    fn unique(&mut self, name: String) -> String {
        if self.names.insert(name.clone()) {
            return name;
        }
        let mut n = 2;
        loop {
            let candidate = format!("{}_{}", name, n);
            if self.names.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}

/// Emit object libraries for packages not emitted yet, returning their names.
fn emit_packages<'p>(
    out: &mut String,
    packages: Vec<&'p Package>,
    emitted: &mut Emitted<'p>,
) -> Vec<String> {
    let mut objects = Vec::new();
    for package in packages {
        if !emitted.paths.insert(package.path.as_str()) {
            continue;
        }
        let library = package.library_name();
        let units: [(&str, Vec<&String>, &Vec<String>); 2] = [
            ("c", package.c_sources().collect(), &package.cflags),
            ("cpp", package.cpp_sources().collect(), &package.cppflags),
        ];
        for (suffix, sources, flags) in units {
            if sources.is_empty() {
                continue;
            }
            let name = emitted.unique(format!("{}_{}", library, suffix));
            out.push_str(&format!("\nadd_library({} OBJECT\n", name));
            for source in sources {
                out.push_str(&format!("  {}\n", quote(source)));
            }
            out.push_str(")\n");
            if !flags.is_empty() {
                out.push_str(&format!(
                    "set_target_properties({} PROPERTIES COMPILE_FLAGS \"{}\")\n",
                    name,
                    join_flags(flags)
                ));
            }
            objects.push(name);
        }
    }
    objects
}

fn emit_executable(
    out: &mut String,
    name: &str,
    main: &str,
    objects: &[String],
    flags: &[String],
    ldflags: &[String],
    libraries: &[String],
) {
    out.push_str(&format!("add_executable({}\n  {}\n", name, quote(main)));
    for object in objects {
        out.push_str(&format!("  $<TARGET_OBJECTS:{}>\n", object));
    }
    out.push_str(")\n");

    let mut properties = Vec::new();
    if !flags.is_empty() {
        properties.push(format!("COMPILE_FLAGS \"{}\"", join_flags(flags)));
    }
    if !ldflags.is_empty() {
        properties.push(format!("LINK_FLAGS \"{}\"", join_flags(ldflags)));
    }
    if !properties.is_empty() {
        out.push_str(&format!(
            "set_target_properties({} PROPERTIES {})\n",
            name,
            properties.join(" ")
        ));
    }
    if !libraries.is_empty() {
        out.push_str(&format!(
            "target_link_libraries({} {})\n",
            name,
            libraries.join(" ")
        ));
    }
}

fn collect_includes<'t>(target: &'t Target, includes: &mut BTreeSet<&'t String>) {
    for bit in &target.bits {
        collect_includes(bit, includes);
    }
    includes.extend(target.include_directories.iter());
}

/// Libraries of a target and its bits, first occurrence wins.
fn collect_libraries(target: &Target, libraries: &mut Vec<String>) {
    for library in &target.libraries {
        push_unique(libraries, library);
    }
    for bit in &target.bits {
        collect_libraries(bit, libraries);
    }
}

fn push_unique(list: &mut Vec<String>, item: &str) {
    if !list.iter().any(|existing| existing == item) {
        list.push(item.to_string());
    }
}

fn join_flags(flags: &[String]) -> String {
    flags
        .iter()
        .map(|flag| flag.replace('\\', "\\\\").replace('"', "\\\""))
        .collect::<Vec<_>>()
        .join(" ")
}

fn quote(arg: &str) -> String {
    if arg.contains(char::is_whitespace) || arg.contains(';') {
        format!("\"{}\"", arg.replace('"', "\\\""))
    } else {
        arg.to_string()
    }
}

/// CMake target names may only hold `[A-Za-z0-9_.+-]`.
fn identifier(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '+' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// `project(VERSION)` only accepts up to four numeric components.
fn cmake_version(version: &str) -> Option<&str> {
    let parts: Vec<&str> = version.split('.').collect();
    let numeric = parts
        .iter()
        .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()));
    (numeric && parts.len() <= 4).then_some(version)
}

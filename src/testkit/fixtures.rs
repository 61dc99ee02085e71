//! On-disk project fixtures for pipeline tests.
//!
//! Callers own the directory (usually a `TempDir`); these helpers only fill it.

use std::fs;
use std::io;
use std::path::Path;

/// A small Next.js-style project: alias config, one shadcn-style component,
/// a Prisma schema and a registry.
pub const NEXT_PROJECT: &[(&str, &str)] = &[
    (
        "tsconfig.json",
        "{\n  \"compilerOptions\": {\n    \"baseUrl\": \".\",\n    \"paths\": { \"@/*\": [\"./src/*\"] }\n  }\n}\n",
    ),
    (
        "package.json",
        "{\n  \"name\": \"fixture\",\n  \"dependencies\": {\n    \"@radix-ui/react-tooltip\": \"^1.0.7\",\n    \"react\": \"^18.2.0\"\n  }\n}\n",
    ),
    ("node_modules/react/package.json", "{\"name\": \"react\", \"version\": \"18.2.0\"}"),
    (
        "node_modules/@radix-ui/react-tooltip/package.json",
        "{\"name\": \"@radix-ui/react-tooltip\", \"version\": \"1.0.7\"}",
    ),
    ("src/components/ui/button.tsx", "export const Button = () => null\n"),
    (
        "src/components/Foo.tsx",
        "import { Button } from '../ui/button'\nimport { toast } from 'sonner@2.0.3'\n\nexport const Foo = () => Button()\n",
    ),
    (
        "prisma/schema.prisma",
        "model Customer {\n  id String @id\n  email String\n  fullName String?\n}\n",
    ),
];

pub fn write_files(root: &Path, files: &[(&str, &str)]) -> io::Result<()> {
    for (path, content) in files {
        let full = root.join(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(full, content)?;
    }
    Ok(())
}

/// `git init` plus one commit of everything currently in `root`.
pub fn init_git_repo(root: &Path) -> Result<git2::Repository, git2::Error> {
    let repo = git2::Repository::init(root)?;
    {
        let mut config = repo.config()?;
        config.set_str("user.name", "Fixture")?;
        config.set_str("user.email", "fixture@example.com")?;
    }
    {
        let mut index = repo.index()?;
        index.add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)?;
        index.write()?;
        let tree = repo.find_tree(index.write_tree()?)?;
        let sig = repo.signature()?;
        repo.commit(Some("HEAD"), &sig, &sig, "initial", &tree, &[])?;
    }
    Ok(repo)
}

/// A compiler line in `file(line,col): error CODE: message` form.
pub fn tsc_line(file: &str, line: usize, column: usize, code: &str, message: &str) -> String {
    format!("{file}({line},{column}): error {code}: {message}")
}

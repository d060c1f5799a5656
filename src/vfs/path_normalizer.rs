use crate::vfs::model::{VfsError, MAX_NAME_LEN, ROOT_PATH};

pub struct PathNormalizer;

impl PathNormalizer {
    /// 将 raw 路径 (相对/绝对) 解析为规范的 "/a/b/c" 格式（无末尾斜杠，除根目录外）
    pub fn normalize(raw: &str, cwd: &str) -> Result<String, VfsError> {
        let raw = raw.trim().replace('\\', "/");
        if raw.is_empty() {
            return Err(VfsError::PathError("路径不能为空".to_string()));
        }
        if raw.contains('\0') {
            return Err(VfsError::PathError("路径包含非法字符".to_string()));
        }

        let cwd = cwd.replace('\\', "/");
        let mut comps: Vec<&str> = Vec::new();
        // 相对路径：先压入 cwd 的有效部分
        if !raw.starts_with('/') {
            Self::push_components(&mut comps, &cwd);
        }
        Self::push_components(&mut comps, &raw);

        let result = if comps.is_empty() {
            ROOT_PATH.to_string()
        } else {
            format!("/{}", comps.join("/"))
        };
        Ok(result)
    }

    fn push_components<'a>(comps: &mut Vec<&'a str>, path: &'a str) {
        for comp in path.split('/') {
            match comp {
                "" | "." => continue,
                ".." => {
                    comps.pop();
                }
                _ => comps.push(comp),
            }
        }
    }

    pub fn join(parent: &str, name: &str) -> String {
        if parent == ROOT_PATH {
            format!("/{}", name)
        } else {
            format!("{}/{}", parent.trim_end_matches('/'), name)
        }
    }

    /// 校验单个节点名
    pub fn validate_name(name: &str) -> Result<(), VfsError> {
        if name.trim().is_empty() {
            return Err(VfsError::InvalidInput("名称不能为空".to_string()));
        }
        if name.len() > MAX_NAME_LEN {
            return Err(VfsError::InvalidInput(format!(
                "名称过长，最多 {} 字节",
                MAX_NAME_LEN
            )));
        }
        if name == "." || name == ".." {
            return Err(VfsError::InvalidInput(format!("非法名称: {}", name)));
        }
        if name.contains(['/', '\\', '\0']) {
            return Err(VfsError::InvalidInput(format!(
                "名称不能包含路径分隔符: {}",
                name
            )));
        }
        Ok(())
    }

    /// 重命名后重写子孙路径，不在 old_prefix 子树内的路径原样返回
    pub fn rebase(path: &str, old_prefix: &str, new_prefix: &str) -> String {
        if path == old_prefix {
            return new_prefix.to_string();
        }
        match path.strip_prefix(old_prefix) {
            Some(rest) if rest.starts_with('/') => format!("{}{}", new_prefix, rest),
            _ => path.to_string(),
        }
    }
}

//! OBJ file loader for 3D models
//!
//! Reads positions, texture coordinates and faces. Polygons are fan-triangulated,
//! V is flipped to Vulkan's top-left origin, every vertex is white, and identical
//! vertices are merged so the index buffer references each unique vertex once.

use super::{AssetError, Model, Vertex};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

const VERTEX_COLOR: [f32; 3] = [1.0, 1.0, 1.0];

/// Wavefront OBJ loader
pub struct ObjLoader;

impl ObjLoader {
    /// Load an OBJ file into a deduplicated model
    pub fn load_model<P: AsRef<Path>>(path: P) -> Result<Model, AssetError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(AssetError::FileNotFound(path.to_path_buf()));
        }

        log::debug!("Loading model from: {}", path.display());
        let model = Self::parse(BufReader::new(File::open(path)?))?;
        log::info!(
            "Loaded model {} ({} vertices, {} indices)",
            path.display(),
            model.vertex_count(),
            model.index_count()
        );
        Ok(model)
    }

    /// Parse OBJ text from any reader
    pub fn parse<R: BufRead>(reader: R) -> Result<Model, AssetError> {
        let mut positions: Vec<[f32; 3]> = Vec::new();
        let mut tex_coords: Vec<[f32; 2]> = Vec::new();
        let mut unique: HashMap<Vertex, u32> = HashMap::new();
        let mut vertices = Vec::new();
        let mut indices = Vec::new();

        for (line_index, line) in reader.lines().enumerate() {
            let line = line?;
            let line_no = line_index + 1;
            let mut parts = line.split_whitespace();

            match parts.next() {
                Some("v") => positions.push(parse_floats::<3>(&mut parts, line_no, "vertex")?),
                Some("vt") => tex_coords.push(parse_floats::<2>(&mut parts, line_no, "texture coordinate")?),
                Some("f") => {
                    let mut corners = Vec::new();
                    for token in parts {
                        let vertex = face_vertex(token, &positions, &tex_coords, line_no)?;
                        let index = *unique.entry(vertex).or_insert_with(|| {
                            vertices.push(vertex);
                            (vertices.len() - 1) as u32
                        });
                        corners.push(index);
                    }

                    if corners.len() < 3 {
                        return Err(AssetError::Parse {
                            line: line_no,
                            reason: format!("face has {} vertices, need at least 3", corners.len()),
                        });
                    }

                    for i in 1..corners.len() - 1 {
                        indices.extend_from_slice(&[corners[0], corners[i], corners[i + 1]]);
                    }
                }
                // Normals, groups, materials and comments are not used
                _ => {}
            }
        }

        Ok(Model::new(vertices, indices))
    }
}

fn parse_floats<'a, const N: usize>(
    parts: &mut impl Iterator<Item = &'a str>,
    line: usize,
    what: &str,
) -> Result<[f32; N], AssetError> {
    let mut values = [0.0; N];
    for value in &mut values {
        let token = parts.next().ok_or_else(|| AssetError::Parse {
            line,
            reason: format!("{what} needs {N} components"),
        })?;
        *value = token.parse().map_err(|_| AssetError::Parse {
            line,
            reason: format!("invalid {what} component '{token}'"),
        })?;
    }
    Ok(values)
}

/// Resolve a 1-based (or negative, relative) OBJ index
fn resolve_index(token: &str, len: usize, line: usize) -> Result<usize, AssetError> {
    let raw: i64 = token.parse().map_err(|_| AssetError::Parse {
        line,
        reason: format!("invalid index '{token}'"),
    })?;

    let resolved = match raw {
        0 => None,
        r if r > 0 => usize::try_from(r - 1).ok(),
        r => usize::try_from(len as i64 + r).ok(),
    };

    resolved.filter(|&i| i < len).ok_or_else(|| AssetError::Parse {
        line,
        reason: format!("index {raw} out of range (have {len})"),
    })
}

fn face_vertex(
    token: &str,
    positions: &[[f32; 3]],
    tex_coords: &[[f32; 2]],
    line: usize,
) -> Result<Vertex, AssetError> {
    let mut fields = token.split('/');
    let position_token = fields.next().unwrap_or_default();
    let position = positions[resolve_index(position_token, positions.len(), line)?];

    let uv = match fields.next() {
        Some(t) if !t.is_empty() => {
            let [u, v] = tex_coords[resolve_index(t, tex_coords.len(), line)?];
            [u, 1.0 - v]
        }
        _ => [0.0, 0.0],
    };

    Ok(Vertex::new(position, VERTEX_COLOR, uv))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const QUAD: &str = "\
# unit quad
v -0.5 -0.5 0.0
v  0.5 -0.5 0.0
v  0.5  0.5 0.0
v -0.5  0.5 0.0
vt 0.0 0.0
vt 1.0 0.0
vt 1.0 1.0
vt 0.0 1.0
f 1/1 2/2 3/3
f 3/3 4/4 1/1
";

    #[test]
    fn quad_shares_vertices_between_triangles() {
        let model = ObjLoader::parse(Cursor::new(QUAD)).unwrap();
        assert_eq!(model.vertex_count(), 4);
        assert_eq!(model.indices(), &[0, 1, 2, 2, 3, 0]);
    }

    #[test]
    fn texture_v_is_flipped_and_color_is_white() {
        let model = ObjLoader::parse(Cursor::new(QUAD)).unwrap();
        let first = model.vertices()[0];
        assert_eq!(first.uv, [0.0, 1.0]);
        assert_eq!(first.color, [1.0, 1.0, 1.0]);
        assert_eq!(model.vertices()[2].uv, [1.0, 0.0]);
    }

    #[test]
    fn polygons_are_fan_triangulated() {
        let text = "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n";
        let model = ObjLoader::parse(Cursor::new(text)).unwrap();
        assert_eq!(model.indices(), &[0, 1, 2, 0, 2, 3]);
    }

    #[test]
    fn negative_indices_are_relative() {
        let text = "v 0 0 0\nv 1 0 0\nv 1 1 0\nf -3 -2 -1\n";
        let model = ObjLoader::parse(Cursor::new(text)).unwrap();
        assert_eq!(model.vertices()[2].position, [1.0, 1.0, 0.0]);
    }

    #[test]
    fn same_position_with_different_uv_is_not_merged() {
        let text = "v 0 0 0\nv 1 0 0\nv 1 1 0\nvt 0 0\nvt 1 1\nf 1/1 2/1 3/1\nf 1/2 2/1 3/1\n";
        let model = ObjLoader::parse(Cursor::new(text)).unwrap();
        assert_eq!(model.vertex_count(), 4);
        assert_eq!(model.index_count(), 6);
    }

    #[test]
    fn out_of_range_index_reports_line() {
        let text = "v 0 0 0\nf 1 2 3\n";
        match ObjLoader::parse(Cursor::new(text)) {
            Err(AssetError::Parse { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn missing_file_is_not_found() {
        let result = ObjLoader::load_model("definitely/missing/model.obj");
        assert!(matches!(result, Err(AssetError::FileNotFound(_))));
    }
}

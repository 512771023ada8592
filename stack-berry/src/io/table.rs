//! 区域统计表的 CSV 输出.

use crate::process::{RegionRecord, RegionTable};
use crate::{StackError, StackResult};
use std::path::Path;

/// 形态学列.
pub const TABLE_HEADER: [&str; 21] = [
    "Label",
    "VoxelCount",
    "Volume",
    "SurfaceArea",
    "Sphericity",
    "Centroid.X",
    "Centroid.Y",
    "Centroid.Z",
    "Box.X.Min",
    "Box.X.Max",
    "Box.Y.Min",
    "Box.Y.Max",
    "Box.Z.Min",
    "Box.Z.Max",
    "EulerNumber",
    "Elli.R1",
    "Elli.R2",
    "Elli.R3",
    "Elli.R1/R2",
    "Elli.R1/R3",
    "Elli.R2/R3",
];

/// 灰度列, 仅在测量了灰度时追加.
pub const TABLE_INTENSITY_HEADER: [&str; 4] = ["Mean", "StdDev", "Min", "Max"];

#[inline]
fn fmt_f(v: f64) -> String {
    format!("{v:.4}")
}

fn record_fields(r: &RegionRecord, with_intensity: bool) -> Vec<String> {
    let b = &r.bounding_box;
    let mut row = vec![
        r.label.to_string(),
        r.voxel_count.to_string(),
        fmt_f(r.volume),
        fmt_f(r.surface_area),
        fmt_f(r.sphericity),
        fmt_f(r.centroid[0]),
        fmt_f(r.centroid[1]),
        fmt_f(r.centroid[2]),
        b.min[0].to_string(),
        b.max[0].to_string(),
        b.min[1].to_string(),
        b.max[1].to_string(),
        b.min[2].to_string(),
        b.max[2].to_string(),
        r.euler_number.to_string(),
    ];
    let e = &r.ellipsoid;
    row.extend(e.radii.iter().chain(&e.elongations).map(|v| fmt_f(*v)));
    if with_intensity {
        match &r.intensity {
            Some(s) => row.extend([
                fmt_f(s.mean),
                fmt_f(s.std_dev),
                s.min.to_string(),
                s.max.to_string(),
            ]),
            None => row.extend(std::iter::repeat(String::new()).take(4)),
        }
    }
    row
}

/// 将统计表写为 CSV. 空表只写表头. 文件已存在时直接覆盖.
pub fn write_table<P: AsRef<Path>>(path: P, table: &RegionTable) -> StackResult<()> {
    let path = path.as_ref();
    let csv_err = |source| StackError::Csv {
        path: path.to_owned(),
        source,
    };
    let mut wtr = csv::Writer::from_path(path).map_err(csv_err)?;

    if table.has_intensity() {
        wtr.write_record(TABLE_HEADER.iter().chain(TABLE_INTENSITY_HEADER.iter()))
            .map_err(csv_err)?;
    } else {
        wtr.write_record(TABLE_HEADER).map_err(csv_err)?;
    }
    for r in table.records() {
        wtr.write_record(record_fields(r, table.has_intensity()))
            .map_err(csv_err)?;
    }
    wtr.flush().map_err(|source| StackError::Io {
        path: path.to_owned(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{BoundingBox, Ellipsoid, IntensityStats};
    use std::fs;

    fn record(label: u32) -> RegionRecord {
        RegionRecord {
            label,
            voxel_count: 27,
            volume: 27.0,
            surface_area: 54.0,
            sphericity: std::f64::consts::PI / 6.0,
            centroid: [2.0, 2.0, 2.5],
            bounding_box: BoundingBox {
                min: [1, 1, 1],
                max: [3, 3, 4],
            },
            euler_number: 1,
            ellipsoid: Ellipsoid {
                radii: [2.5, 2.0, 2.0],
                elongations: [1.25, 1.25, 1.0],
            },
            intensity: None,
        }
    }

    #[test]
    fn test_empty_table_is_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        write_table(&path, &RegionTable::new("empty.tif", vec![])).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, format!("{}\n", TABLE_HEADER.join(",")));
    }

    #[test]
    fn test_table_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cells.csv");
        write_table(&path, &RegionTable::new("cells.tif", vec![record(1), record(4)])).unwrap();

        let mut rdr = csv::Reader::from_path(&path).unwrap();
        assert_eq!(rdr.headers().unwrap().len(), 21);
        let rows: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][0], "1");
        assert_eq!(&rows[1][0], "4");
        assert_eq!(&rows[0][4], "0.5236");
        assert_eq!(&rows[0][7], "2.5000");
        assert_eq!(&rows[0][13], "4");
        assert_eq!(&rows[0][14], "1");
        assert_eq!(&rows[0][15], "2.5000");
        assert_eq!(&rows[0][18], "1.2500");
        assert_eq!(&rows[0][20], "1.0000");
    }

    #[test]
    fn test_intensity_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cells.csv");
        let mut r = record(3);
        r.intensity = Some(IntensityStats {
            mean: 12.5,
            std_dev: 0.5,
            min: 12,
            max: 13,
        });
        write_table(&path, &RegionTable::new("cells.tif", vec![r])).unwrap();

        let mut rdr = csv::Reader::from_path(&path).unwrap();
        let headers = rdr.headers().unwrap().clone();
        assert_eq!(&headers[21], "Mean");
        assert_eq!(&headers[24], "Max");
        let row = rdr.records().next().unwrap().unwrap();
        assert_eq!(&row[21], "12.5000");
        assert_eq!(&row[23], "12");

        // 测量了灰度但没有任何区域: 表头仍然带灰度列.
        let table = RegionTable::new("none.tif", vec![]).with_intensity_columns(true);
        write_table(&path, &table).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.trim_end().ends_with("Mean,StdDev,Min,Max"));
        assert_eq!(text.lines().count(), 1);
    }
}

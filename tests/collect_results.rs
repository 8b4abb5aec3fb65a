use std::fs;

use wing_domain::{SweepGrid, SweepPoint};
use wingflow::results::{collect, write_results, RESULTS_FILE};

const LOG_HEAD: &str = "winglet cant=0 sweep=0 np=48 on cx3-1-1\n\
+----------------------------------------------------+\n\
|  Inner_Iter|   rms[Rho]|  rms[RhoE]|      CL|      CD|\n\
+----------------------------------------------------+\n";

#[test]
fn one_row_per_existing_workspace() {
    let out = tempfile::tempdir().unwrap();
    let grid = SweepGrid::new(vec![-15.0, 0.0], vec![0.0, 10.0]).unwrap();

    // c-15_s0: two logs, the later one holds the final history
    let a = out.path().join("winglet_c-15_s0");
    fs::create_dir_all(&a).unwrap();
    fs::write(a.join("submit.pbs.o100"), format!("{LOG_HEAD}|  0| -1.0| 2.0| 0.10| 0.020|\n")).unwrap();
    fs::write(a.join("submit.pbs.o101"),
              format!("{LOG_HEAD}|  0| -1.0| 2.0| 0.20| 0.021|\n|  1| -1.1| 1.9| 0.25| 0.022|\n")).unwrap();
    // c0_s10: workspace but the job never wrote a history
    let b = out.path().join("winglet_c0_s10");
    fs::create_dir_all(&b).unwrap();
    fs::write(b.join("submit.pbs.o102"), "job killed\n").unwrap();
    // log inside a stage directory is also found
    let c = out.path().join("winglet_c0_s0");
    fs::create_dir_all(c.join("CFD/Euler")).unwrap();
    fs::write(c.join("CFD/Euler/submit.pbs.o103"), format!("{LOG_HEAD}|  7| -3.0| 1.0| 0.31| 0.015|\n")).unwrap();

    let rows = collect(out.path(), &grid).unwrap();

    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].point, SweepPoint::new(-15.0, 0.0));
    assert_eq!((rows[0].cl, rows[0].cd), (Some(0.25), Some(0.022)));
    assert_eq!(rows[1].point, SweepPoint::new(0.0, 0.0));
    assert_eq!((rows[1].cl, rows[1].cd), (Some(0.31), Some(0.015)));
    assert_eq!(rows[2].point, SweepPoint::new(0.0, 10.0));
    assert_eq!((rows[2].cl, rows[2].cd), (None, None));

    let results = out.path().join(RESULTS_FILE);
    write_results(&results, &rows).unwrap();
    assert_eq!(fs::read_to_string(results).unwrap(),
               "-15 0 0.25 0.022\n0 0 0.31 0.015\n0 10 None None\n");
}
